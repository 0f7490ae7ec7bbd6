use std::collections::BTreeMap;

use engine::{
    AnimationMixer, ArrivalBehavior, AssetEvent, BodyHandle, EntityId, FigurePart, GroundPlane,
    LoadedActor, LocomotionClips, PhysicsWorld, PropShape, Quat, RenderableDesc, RenderableKind,
    SceneWorld, SelectionMode, Transform, TweenCompletion, TweenSet, Vec3,
};
use tracing::{info, warn};

use super::navigation::{complete_navigation, NavigationConfig, NavigationRequest};
use super::orientation::follow_orientations;
use super::roster::{Actor, ActorId, Roster};

/// Minimum impostor size for models whose bounds collapse to a point.
const MIN_FIGURE_EXTENT: f32 = 0.1;

/// Placement and clip names for a manifest actor, kept until its assets arrive.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ActorSpawn {
    pub name: String,
    pub scale: f32,
    pub position: Vec3,
    pub locomotion: LocomotionClips,
    pub start_clip: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StageProp {
    pub name: String,
    pub entity: EntityId,
    pub shape: PropShape,
    pub body: Option<BodyHandle>,
}

/// Everything the stage simulates. Owned by the scene and lent to the
/// navigation controller and the orientation follower each frame.
pub(crate) struct StageState {
    pub roster: Roster,
    pub spawns: Vec<ActorSpawn>,
    pub selected: Option<ActorId>,
    pub selection: SelectionMode,
    pub arrival: ArrivalBehavior,
    pub config: NavigationConfig,
    pub ground: GroundPlane,
    pub tweens: TweenSet<ActorId>,
    pub requests: BTreeMap<ActorId, NavigationRequest>,
    pub physics: Option<PhysicsWorld>,
    pub props: Vec<StageProp>,
    next_request_id: u64,
    completions: Vec<TweenCompletion<ActorId>>,
}

impl StageState {
    pub(crate) fn new(
        spawns: Vec<ActorSpawn>,
        selection: SelectionMode,
        arrival: ArrivalBehavior,
        config: NavigationConfig,
    ) -> Self {
        Self {
            roster: Roster::loading(spawns.iter().map(|spawn| spawn.name.clone())),
            spawns,
            selected: None,
            selection,
            arrival,
            config,
            ground: GroundPlane::default(),
            tweens: TweenSet::new(),
            requests: BTreeMap::new(),
            physics: None,
            props: Vec::new(),
            next_request_id: 0,
            completions: Vec::new(),
        }
    }

    pub(crate) fn allocate_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.saturating_add(1);
        id
    }

    pub(crate) fn selected_actor(&self) -> Option<&Actor> {
        self.selected.and_then(|id| self.roster.get(id))
    }

    pub(crate) fn selected_entity(&self) -> Option<EntityId> {
        self.selected_actor().map(|actor| actor.entity)
    }

    pub(crate) fn select(&mut self, id: ActorId) -> Result<(), String> {
        match self.roster.slot(id) {
            None => Err(format!("actor {} does not exist", id.0)),
            Some(slot) if self.roster.get(id).is_none() => {
                Err(format!("actor {} is {}", id.0, slot.state_label()))
            }
            Some(_) => {
                self.selected = Some(id);
                info!(actor = id.0, "actor_selected");
                Ok(())
            }
        }
    }

    pub(crate) fn prop(&self, name: &str) -> Option<&StageProp> {
        self.props.iter().find(|prop| prop.name == name)
    }

    pub(crate) fn handle_asset_event(&mut self, event: AssetEvent, world: &mut SceneWorld) {
        match event {
            AssetEvent::ActorLoaded(loaded) => {
                self.register_loaded_actor(loaded, world);
            }
            AssetEvent::ActorFailed { slot, name, reason } => {
                if self.roster.mark_failed(ActorId(slot), reason.as_str()) {
                    warn!(actor = %name, slot, reason = %reason, "actor_absent");
                }
            }
            AssetEvent::AllSettled => {
                let abandoned = self.roster.fail_pending("loader finished without a result");
                info!(
                    ready = self.roster.ready_count(),
                    total = self.roster.len(),
                    abandoned,
                    "stage_assets_settled"
                );
            }
        }
    }

    /// Turns a loaded model into a ready actor with its own render entity.
    pub(crate) fn register_loaded_actor(
        &mut self,
        loaded: LoadedActor,
        world: &mut SceneWorld,
    ) -> Option<ActorId> {
        let id = ActorId(loaded.slot);
        let Some(spawn) = self.spawns.get(loaded.slot).cloned() else {
            warn!(actor = %loaded.name, slot = loaded.slot, "actor_slot_unknown");
            return None;
        };

        let parts = loaded
            .parts
            .iter()
            .map(|part| FigurePart {
                mesh_name: part.mesh_name.clone(),
                material: part
                    .material
                    .as_deref()
                    .and_then(|name| world.environment().material_id(name)),
            })
            .collect();
        let height = (loaded.model.height() * spawn.scale).max(MIN_FIGURE_EXTENT);
        let radius = (loaded.model.radius() * spawn.scale).max(MIN_FIGURE_EXTENT);
        let entity = world.spawn(
            Transform::from_position(spawn.position),
            RenderableDesc::new(
                RenderableKind::Figure {
                    height,
                    radius,
                    parts,
                    stride_phase: None,
                },
                spawn.name.clone(),
            ),
        );

        let mut mixer = AnimationMixer::new(loaded.clips);
        if let Some(start_clip) = &spawn.start_clip {
            mixer.set_clip(start_clip, self.config.crossfade_seconds);
        }

        let actor = Actor {
            id,
            name: spawn.name.clone(),
            entity,
            position: spawn.position,
            orientation: Quat::IDENTITY,
            target_orientation: Quat::IDENTITY,
            mixer,
            locomotion: spawn.locomotion.clone(),
            bounds_min: loaded.model.bounds_min,
            bounds_max: loaded.model.bounds_max,
            scale: spawn.scale,
        };
        if !self.roster.mark_ready(actor) {
            world.despawn(entity);
            warn!(actor = %spawn.name, slot = loaded.slot, "actor_slot_already_settled");
            return None;
        }

        if self.selection == SelectionMode::Auto && self.selected.is_none() {
            self.selected = Some(id);
        }
        info!(
            actor = %spawn.name,
            slot = loaded.slot,
            height,
            auto_selected = self.selected == Some(id),
            "actor_ready"
        );
        Some(id)
    }

    /// One simulation step: physics, clips, facing, movement, then the
    /// render entities are brought in line with the simulated state.
    pub(crate) fn advance(&mut self, dt_seconds: f32, world: &mut SceneWorld) {
        if let Some(physics) = self.physics.as_mut() {
            physics.step(dt_seconds);
            physics.sync_into(world);
        }

        for actor in self.roster.ready_mut() {
            actor.mixer.update(dt_seconds);
        }

        follow_orientations(self, dt_seconds);

        let Self {
            tweens,
            roster,
            completions,
            ..
        } = self;
        tweens.advance(
            dt_seconds,
            |key, value| {
                if let Some(actor) = roster.get_mut(key) {
                    actor.position = value;
                }
            },
            completions,
        );
        let finished = std::mem::take(&mut self.completions);
        for completion in &finished {
            complete_navigation(self, *completion);
        }
        self.completions = finished;
        self.completions.clear();

        self.sync_actor_entities(world);
    }

    fn sync_actor_entities(&self, world: &mut SceneWorld) {
        for actor in self.roster.ready() {
            let moving = self.requests.contains_key(&actor.id);
            let Some(entity) = world.find_entity_mut(actor.entity) else {
                continue;
            };
            entity.transform.position = actor.position;
            entity.transform.rotation = actor.orientation;
            if let RenderableKind::Figure { stride_phase, .. } = &mut entity.renderable.kind {
                *stride_phase = if moving { actor.stride_phase() } else { None };
            }
        }
    }
}
