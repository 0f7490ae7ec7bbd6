use std::path::PathBuf;

use engine::{
    load_stage_manifest, spawn_stage_loader, AppPaths, AssetEvent, ClipSwitch, DebugMarker,
    DebugMarkerKind, InputSnapshot, ParamError, ParamSet, Scene, SceneCommand, SceneDebugCommand,
    SceneDebugCommandResult, SceneKey, SceneWorld, StageLoader, StageManifest,
};
use glam::EulerRot;
use serde::Serialize;
use tracing::{error, info, warn};

mod navigation;
mod orientation;
mod params;
mod roster;
mod setup;
mod state;

use navigation::{handle_click, ClickOutcome, IgnoredClick};
use params::{apply_dirty_params, build_param_set};
use roster::{ActorId, ActorSlot};
use setup::{assemble_stage, StageAssembly};
use state::StageState;

/// Destination markers outlive the walk slightly so the arrival is visible.
const MARKER_LINGER_SECONDS: f32 = 0.25;

pub(crate) enum StageSource {
    File(PathBuf),
    #[cfg_attr(not(test), allow(dead_code))]
    Manifest(Box<StageManifest>),
}

pub(crate) struct StageScene {
    label: &'static str,
    source: StageSource,
    assets_dir: PathBuf,
    switch_target: SceneKey,
    stage_name: String,
    state: Option<StageState>,
    loader: Option<StageLoader>,
    params: ParamSet,
    asset_events: Vec<AssetEvent>,
    load_error: Option<String>,
    last_click: Option<ClickOutcome>,
}

impl StageScene {
    pub(crate) fn new(
        label: &'static str,
        source: StageSource,
        assets_dir: PathBuf,
        switch_target: SceneKey,
    ) -> Self {
        Self {
            label,
            source,
            assets_dir,
            switch_target,
            stage_name: String::new(),
            state: None,
            loader: None,
            params: ParamSet::new(),
            asset_events: Vec::new(),
            load_error: None,
            last_click: None,
        }
    }

    fn resolve_manifest(&self) -> Result<StageManifest, String> {
        match &self.source {
            StageSource::File(path) => load_stage_manifest(path).map_err(|err| err.to_string()),
            StageSource::Manifest(manifest) => Ok(manifest.as_ref().clone()),
        }
    }

    fn drain_asset_events(&mut self, world: &mut SceneWorld) {
        let (Some(loader), Some(state)) = (self.loader.as_mut(), self.state.as_mut()) else {
            return;
        };
        loader.poll(&mut self.asset_events);
        for event in self.asset_events.drain(..) {
            state.handle_asset_event(event, world);
        }
        if loader.is_settled() {
            // A loader that hung up early never sends its own AllSettled.
            if state.roster.fail_pending("asset loader stopped") > 0 {
                warn!(scene = self.label, "stage_loader_disconnected");
            }
            self.loader = None;
        }
    }

    fn play_clip(&mut self, clip: &str) -> SceneDebugCommandResult {
        let Some(state) = self.state.as_mut() else {
            return SceneDebugCommandResult::Error("stage is not loaded".to_string());
        };
        let crossfade = state.config.crossfade_seconds;
        let Some(actor) = state.selected.and_then(|id| state.roster.get_mut(id)) else {
            return SceneDebugCommandResult::Error("no selected actor".to_string());
        };
        match actor.mixer.set_clip(clip, crossfade) {
            ClipSwitch::Switched => {
                info!(actor = %actor.name, clip, "clip_requested");
                SceneDebugCommandResult::Success(format!("{} now playing '{clip}'", actor.name))
            }
            ClipSwitch::AlreadyActive => {
                SceneDebugCommandResult::Success(format!("{} already playing '{clip}'", actor.name))
            }
            ClipSwitch::UnknownClip => {
                let available: Vec<&str> = actor
                    .mixer
                    .clips()
                    .iter()
                    .map(|clip| clip.name.as_str())
                    .collect();
                SceneDebugCommandResult::Error(format!(
                    "unknown clip '{clip}' (available: {})",
                    available.join(", ")
                ))
            }
        }
    }

    fn set_param(&mut self, name: &str, raw: &str, world: &mut SceneWorld) -> SceneDebugCommandResult {
        let value = match self.params.set_from_str(name, raw) {
            Ok(value) => value,
            Err(err) => return SceneDebugCommandResult::Error(err.to_string()),
        };
        if let Some(state) = self.state.as_ref() {
            apply_dirty_params(&mut self.params, world, state);
        }
        SceneDebugCommandResult::Success(format!("{name} = {}", value.display()))
    }

    fn format_dump_state(&self, world: &SceneWorld) -> Result<String, serde_json::Error> {
        let Some(state) = self.state.as_ref() else {
            return serde_json::to_string_pretty(&StageDump {
                stage: &self.stage_name,
                loaded: false,
                load_error: self.load_error.as_deref(),
                clock_seconds: 0.0,
                selected: None,
                actors: Vec::new(),
                props: Vec::new(),
            });
        };

        let actors = state
            .roster
            .slots()
            .map(|(id, slot)| match slot {
                ActorSlot::Ready(actor) => ActorDump {
                    id: id.0,
                    name: &actor.name,
                    state: slot.state_label(),
                    position: Some(actor.position.to_array()),
                    yaw_radians: Some(actor.orientation.to_euler(EulerRot::YXZ).0),
                    clip: actor.active_clip(),
                    reason: None,
                    navigation: state.requests.get(&id).map(|request| NavigationDump {
                        request_id: request.request_id,
                        target: request.target.to_array(),
                        duration_seconds: request.duration_seconds,
                        locomotion: request.locomotion.label(),
                    }),
                },
                ActorSlot::Loading { name } => ActorDump::absent(id, name, slot.state_label(), None),
                ActorSlot::Failed { name, reason } => {
                    ActorDump::absent(id, name, slot.state_label(), Some(reason.as_str()))
                }
            })
            .collect();
        let props = state
            .props
            .iter()
            .map(|prop| PropDump {
                name: &prop.name,
                dynamic: prop.body.is_some(),
                position: world
                    .find_entity(prop.entity)
                    .map(|entity| entity.transform.position.to_array()),
            })
            .collect();

        serde_json::to_string_pretty(&StageDump {
            stage: &self.stage_name,
            loaded: true,
            load_error: self.load_error.as_deref(),
            clock_seconds: state.tweens.now_seconds(),
            selected: state.selected.map(|id| id.0),
            actors,
            props,
        })
    }
}

impl Scene for StageScene {
    fn load(&mut self, world: &mut SceneWorld) {
        self.state = None;
        self.loader = None;
        self.load_error = None;
        self.last_click = None;
        self.params = ParamSet::new();

        let manifest = match self.resolve_manifest() {
            Ok(manifest) => manifest,
            Err(reason) => {
                error!(scene = self.label, error = %reason, "stage_manifest_failed");
                self.load_error = Some(reason);
                return;
            }
        };
        self.stage_name = manifest.name.clone();

        let StageAssembly {
            mut state,
            load_requests,
        } = assemble_stage(&manifest, &self.assets_dir, world);
        if !load_requests.is_empty() {
            match spawn_stage_loader(load_requests) {
                Ok(loader) => self.loader = Some(loader),
                Err(err) => {
                    let reason = err.to_string();
                    warn!(scene = self.label, error = %reason, "stage_loader_failed");
                    state.roster.fail_pending(&reason);
                    self.load_error = Some(reason);
                }
            }
        }
        world.apply_pending();

        self.params = build_param_set(world, &state).unwrap_or_else(|err: ParamError| {
            warn!(scene = self.label, error = %err, "param_panel_unavailable");
            ParamSet::new()
        });
        info!(
            scene = self.label,
            stage = %self.stage_name,
            actors = state.roster.len(),
            params = self.params.len(),
            entity_count = world.entity_count(),
            "scene_loaded"
        );
        self.state = Some(state);
    }

    fn update(
        &mut self,
        dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        if input.switch_scene_pressed() {
            return SceneCommand::SwitchTo(self.switch_target);
        }

        world.camera_mut().apply_input(input, dt_seconds);
        self.drain_asset_events(world);
        world.apply_pending();

        let Some(state) = self.state.as_mut() else {
            return SceneCommand::None;
        };
        apply_dirty_params(&mut self.params, world, state);

        for event in input.pointer_events() {
            let outcome = handle_click(state, world.camera(), *event, input.window_size());
            if let ClickOutcome::Navigating {
                target,
                duration_seconds,
                ..
            } = outcome
            {
                world.set_debug_marker(DebugMarker {
                    kind: DebugMarkerKind::Destination,
                    position_world: target,
                    ttl_seconds: duration_seconds + MARKER_LINGER_SECONDS,
                });
            }
            self.last_click = Some(outcome);
        }

        state.advance(dt_seconds, world);
        world.set_selected_actor_visual(state.selected_entity());
        world.tick_debug_markers(dt_seconds);

        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        info!(
            scene = self.label,
            stage = %self.stage_name,
            entity_count = world.entity_count(),
            "scene_unload"
        );
        self.loader = None;
        self.state = None;
        self.asset_events.clear();
        self.last_click = None;
    }

    fn debug_title(&self, world: &SceneWorld) -> Option<String> {
        let state = self.state.as_ref()?;
        let selected = state
            .selected_actor()
            .map(|actor| format!("{} ({})", actor.name, actor.active_clip().unwrap_or("none")))
            .unwrap_or_else(|| "none".to_string());
        Some(format!(
            "toonstage | Stage {} | Actors {}/{} | Selected {} | Entities {}",
            self.label,
            state.roster.ready_count(),
            state.roster.len(),
            selected,
            world.entity_count()
        ))
    }

    fn debug_lines(&self, world: &SceneWorld) -> Option<Vec<String>> {
        let mut lines = vec![format!("stage: {} ({})", self.stage_name, self.label)];
        if let Some(reason) = &self.load_error {
            lines.push(format!("load error: {reason}"));
        }
        let Some(state) = self.state.as_ref() else {
            return Some(lines);
        };

        for (id, slot) in state.roster.slots() {
            let marker = if state.selected == Some(id) { '*' } else { ' ' };
            let line = match slot {
                ActorSlot::Ready(actor) => format!(
                    "{marker}{} {}: ({:.2}, {:.2}) clip:{}",
                    id.0,
                    actor.name,
                    actor.position.x,
                    actor.position.z,
                    actor.active_clip().unwrap_or("none")
                ),
                _ => format!("{marker}{} {}: {}", id.0, slot.name(), slot.state_label()),
            };
            lines.push(line);
        }
        lines.push(format!(
            "tweens: {} markers: {}",
            state.tweens.active_count(),
            world.debug_markers().len()
        ));
        if let Some(physics) = state.physics.as_ref() {
            lines.push(format!("bodies: {}", physics.body_count()));
        }
        lines.push(match self.last_click {
            None => "click: none".to_string(),
            Some(ClickOutcome::Selected(id)) => format!("click: selected {}", id.0),
            Some(ClickOutcome::Navigating {
                actor,
                target,
                duration_seconds,
                locomotion,
                ..
            }) => format!(
                "click: {} {} to ({:.2}, {:.2}) in {:.2}s",
                actor.0,
                locomotion.label(),
                target.x,
                target.z,
                duration_seconds
            ),
            Some(ClickOutcome::Ignored(reason)) => format!(
                "click: ignored ({})",
                match reason {
                    IgnoredClick::OutsideWindow => "outside window",
                    IgnoredClick::NoHit => "no hit",
                    IgnoredClick::NoSelection => "no selection",
                }
            ),
        });
        Some(lines)
    }

    fn params(&self) -> Option<&ParamSet> {
        (!self.params.is_empty()).then_some(&self.params)
    }

    fn execute_debug_command(
        &mut self,
        command: SceneDebugCommand,
        world: &mut SceneWorld,
    ) -> SceneDebugCommandResult {
        match command {
            SceneDebugCommand::ListParams => {
                if self.params.is_empty() {
                    return SceneDebugCommandResult::Error("no params registered".to_string());
                }
                let lines: Vec<String> = self
                    .params
                    .iter()
                    .map(|(spec, value)| {
                        format!("{}/{} = {}", spec.folder, spec.name, value.display())
                    })
                    .collect();
                SceneDebugCommandResult::Success(lines.join("\n"))
            }
            SceneDebugCommand::GetParam { name } => match self.params.get(&name) {
                Some(value) => {
                    SceneDebugCommandResult::Success(format!("{name} = {}", value.display()))
                }
                None => SceneDebugCommandResult::Error(ParamError::UnknownParam { name }.to_string()),
            },
            SceneDebugCommand::SetParam { name, value } => self.set_param(&name, &value, world),
            SceneDebugCommand::PlayClip { clip } => self.play_clip(&clip),
            SceneDebugCommand::Select { actor_id } => {
                let Some(state) = self.state.as_mut() else {
                    return SceneDebugCommandResult::Error("stage is not loaded".to_string());
                };
                let Ok(index) = usize::try_from(actor_id) else {
                    return SceneDebugCommandResult::Error(format!("actor {actor_id} does not exist"));
                };
                match state.select(ActorId(index)) {
                    Ok(()) => {
                        world.set_selected_actor_visual(state.selected_entity());
                        SceneDebugCommandResult::Success(format!("selected actor {actor_id}"))
                    }
                    Err(reason) => SceneDebugCommandResult::Error(reason),
                }
            }
            SceneDebugCommand::DumpState => match self.format_dump_state(world) {
                Ok(json) => SceneDebugCommandResult::Success(json),
                Err(err) => SceneDebugCommandResult::Error(format!("dump_state failed: {err}")),
            },
        }
    }
}

#[derive(Serialize)]
struct StageDump<'a> {
    stage: &'a str,
    loaded: bool,
    load_error: Option<&'a str>,
    clock_seconds: f64,
    selected: Option<usize>,
    actors: Vec<ActorDump<'a>>,
    props: Vec<PropDump<'a>>,
}

#[derive(Serialize)]
struct ActorDump<'a> {
    id: usize,
    name: &'a str,
    state: &'static str,
    position: Option<[f32; 3]>,
    yaw_radians: Option<f32>,
    clip: Option<&'a str>,
    reason: Option<&'a str>,
    navigation: Option<NavigationDump>,
}

impl<'a> ActorDump<'a> {
    fn absent(id: ActorId, name: &'a str, state: &'static str, reason: Option<&'a str>) -> Self {
        Self {
            id: id.0,
            name,
            state,
            position: None,
            yaw_radians: None,
            clip: None,
            reason,
            navigation: None,
        }
    }
}

#[derive(Serialize)]
struct NavigationDump {
    request_id: u64,
    target: [f32; 3],
    duration_seconds: f32,
    locomotion: &'static str,
}

#[derive(Serialize)]
struct PropDump<'a> {
    name: &'a str,
    dynamic: bool,
    position: Option<[f32; 3]>,
}

pub(crate) fn build_scene_pair(
    paths: &AppPaths,
    stage_a: PathBuf,
    stage_b: PathBuf,
) -> (Box<dyn Scene>, Box<dyn Scene>) {
    let scene_a = StageScene::new(
        "A",
        StageSource::File(stage_a),
        paths.assets_dir.clone(),
        SceneKey::B,
    );
    let scene_b = StageScene::new(
        "B",
        StageSource::File(stage_b),
        paths.assets_dir.clone(),
        SceneKey::A,
    );
    (Box::new(scene_a), Box::new(scene_b))
}

#[cfg(test)]
mod tests;
