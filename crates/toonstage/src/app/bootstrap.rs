use std::path::PathBuf;
use std::process::ExitCode;

use engine::{resolve_app_paths, AppPaths, LoopConfig, Scene};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use super::stage;

const STAGE_A_ENV_VAR: &str = "TOONSTAGE_STAGE_A";
const STAGE_B_ENV_VAR: &str = "TOONSTAGE_STAGE_B";
const DEFAULT_STAGE_A: &str = "single.json";
const DEFAULT_STAGE_B: &str = "spiders.json";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene_a: Box<dyn Scene>,
    pub(crate) scene_b: Box<dyn Scene>,
}

/// Sets up logging, finds the project root and builds both stages. Root
/// resolution failures are reported here since no window exists yet.
pub(crate) fn build_app() -> Result<AppWiring, ExitCode> {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "=== toonstage startup ===");

    let paths = resolve_app_paths().map_err(|err| {
        error!(error = %err, "startup_failed");
        ExitCode::FAILURE
    })?;
    let stage_a = stage_path_from(&paths, std::env::var(STAGE_A_ENV_VAR).ok(), DEFAULT_STAGE_A);
    let stage_b = stage_path_from(&paths, std::env::var(STAGE_B_ENV_VAR).ok(), DEFAULT_STAGE_B);
    info!(
        root = %paths.root.display(),
        stage_a = %stage_a.display(),
        stage_b = %stage_b.display(),
        "stages_resolved"
    );

    let (scene_a, scene_b) = stage::build_scene_pair(&paths, stage_a, stage_b);
    Ok(AppWiring {
        config: LoopConfig::default(),
        scene_a,
        scene_b,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Relative overrides resolve against the stages directory, absolute ones
/// are taken as given. Blank overrides fall back to the default file.
fn stage_path_from(paths: &AppPaths, override_value: Option<String>, default_file: &str) -> PathBuf {
    match override_value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(value) => paths.stages_dir.join(value),
        None => paths.stages_dir.join(default_file),
    }
}
