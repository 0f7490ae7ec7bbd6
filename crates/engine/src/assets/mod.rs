mod gradient;
mod loader;
mod manifest;
mod model;

use std::path::PathBuf;

use thiserror::Error;

pub use gradient::{
    GradientRamp, GradientStop, ToneMap, BACKGROUND_GRADIENT_COLORS, BACKGROUND_GRADIENT_OFFSETS,
    BACKGROUND_TEXTURE_ROWS,
};
pub(crate) use gradient::unpack_rgb;
pub use loader::{
    load_actor, spawn_stage_loader, ActorLoadRequest, AssetEvent, ClipRequest, ClipRequestSource,
    LoadedActor, PartMaterial, StageLoader,
};
pub use manifest::{
    format_hex_color, load_stage_manifest, parse_hex_color, parse_stage_manifest, ActorManifest,
    ArrivalBehavior, BackgroundManifest, ClipManifest, ClipSource, LightingManifest,
    LocomotionClips, MaterialBinding, MaterialManifest, PropManifest, PropShapeManifest,
    SelectionMode, StageManifest,
};
pub use model::{clips_from_file, load_model, ModelAsset};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to import model {path}: {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("model {path} contains no meshes")]
    NoMeshes { path: PathBuf },
    #[error("clip file {path} contains no animations")]
    NoAnimations { path: PathBuf },
    #[error("model {path} has no embedded animation at index {index}")]
    MissingEmbeddedClip { path: PathBuf, index: usize },
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {path} is empty")]
    EmptyImage { path: PathBuf },
    #[error("failed to spawn asset loader thread: {source}")]
    SpawnLoader {
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read stage manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse stage manifest {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid stage manifest {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}
