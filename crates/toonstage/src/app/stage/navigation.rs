use engine::{
    cast_scene_ray, pointer_to_ndc, ArrivalBehavior, ClipSwitch, OrbitCamera,
    PointerEvent, PointerEventKind, RayHit, SelectionMode, TweenCompletion, TweenId, Vec3,
};
use tracing::{debug, info};

use super::orientation::yaw_look_at;
use super::roster::{Actor, ActorId};
use super::state::StageState;

pub(crate) const WALK_SECONDS_PER_UNIT: f32 = 0.2;
pub(crate) const RUN_SECONDS_PER_UNIT: f32 = 0.1;
pub(crate) const TURN_SPEED_RADIANS_PER_SECOND: f32 = 10.0;
pub(crate) const ORIENTATION_EPSILON_RADIANS: f32 = 1.0e-3;
pub(crate) const CLIP_CROSSFADE_SECONDS: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NavigationConfig {
    pub walk_seconds_per_unit: f32,
    pub run_seconds_per_unit: f32,
    pub turn_speed_radians_per_second: f32,
    pub orientation_epsilon_radians: f32,
    pub crossfade_seconds: f32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            walk_seconds_per_unit: WALK_SECONDS_PER_UNIT,
            run_seconds_per_unit: RUN_SECONDS_PER_UNIT,
            turn_speed_radians_per_second: TURN_SPEED_RADIANS_PER_SECOND,
            orientation_epsilon_radians: ORIENTATION_EPSILON_RADIANS,
            crossfade_seconds: CLIP_CROSSFADE_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Locomotion {
    Walk,
    Run,
}

impl Locomotion {
    pub(crate) fn from_pointer(kind: PointerEventKind) -> Self {
        match kind {
            PointerEventKind::Click => Locomotion::Walk,
            PointerEventKind::DoubleClick => Locomotion::Run,
        }
    }

    pub(crate) fn seconds_per_unit(self, config: &NavigationConfig) -> f32 {
        match self {
            Locomotion::Walk => config.walk_seconds_per_unit,
            Locomotion::Run => config.run_seconds_per_unit,
        }
    }

    fn clip(self, actor: &Actor) -> &str {
        match self {
            Locomotion::Walk => &actor.locomotion.walk,
            Locomotion::Run => &actor.locomotion.run,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Locomotion::Walk => "walk",
            Locomotion::Run => "run",
        }
    }
}

/// In-flight move of one actor. Replaced wholesale by the next request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NavigationRequest {
    pub request_id: u64,
    pub actor: ActorId,
    pub target: Vec3,
    pub duration_seconds: f32,
    pub started_at_seconds: f64,
    pub locomotion: Locomotion,
    pub tween: TweenId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IgnoredClick {
    OutsideWindow,
    NoHit,
    NoSelection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ClickOutcome {
    Selected(ActorId),
    Navigating {
        actor: ActorId,
        request_id: u64,
        target: Vec3,
        duration_seconds: f32,
        locomotion: Locomotion,
    },
    Ignored(IgnoredClick),
}

pub(crate) fn navigation_duration(distance: f32, seconds_per_unit: f32) -> f32 {
    if !distance.is_finite() || !seconds_per_unit.is_finite() {
        return 0.0;
    }
    distance.max(0.0) * seconds_per_unit.max(0.0)
}

/// Resolves a pointer press against the stage: actors first (only when the
/// stage picks actors explicitly), then the ground plane.
pub(crate) fn handle_click(
    state: &mut StageState,
    camera: &OrbitCamera,
    event: PointerEvent,
    window_size: (u32, u32),
) -> ClickOutcome {
    let Some(ndc) = pointer_to_ndc(event.position_px, window_size) else {
        return ClickOutcome::Ignored(IgnoredClick::OutsideWindow);
    };
    let ray = camera.ray_from_ndc(ndc);
    let pickable: Vec<_> = if state.selection == SelectionMode::Explicit {
        state
            .roster
            .ready()
            .map(|actor| (actor.id, actor.hit_volume()))
            .collect()
    } else {
        Vec::new()
    };

    match cast_scene_ray(&ray, pickable, &state.ground) {
        RayHit::Actor(id) => {
            state.selected = Some(id);
            info!(actor = id.0, "actor_selected");
            ClickOutcome::Selected(id)
        }
        RayHit::Ground(point) => {
            let Some(actor) = state.selected else {
                debug!(x = point.x, z = point.z, "ground_click_without_selection");
                return ClickOutcome::Ignored(IgnoredClick::NoSelection);
            };
            start_navigation(state, actor, point, Locomotion::from_pointer(event.kind))
                .unwrap_or(ClickOutcome::Ignored(IgnoredClick::NoSelection))
        }
        RayHit::Nothing => ClickOutcome::Ignored(IgnoredClick::NoHit),
    }
}

/// Cancels the actor's current move, turns it toward `target` and starts a
/// linear position tween plus the matching locomotion clip.
pub(crate) fn start_navigation(
    state: &mut StageState,
    actor_id: ActorId,
    target: Vec3,
    locomotion: Locomotion,
) -> Option<ClickOutcome> {
    let config = state.config;
    let actor = state.roster.get_mut(actor_id)?;

    let distance = actor.position.distance(target);
    let duration_seconds = navigation_duration(distance, locomotion.seconds_per_unit(&config));
    if let Some(facing) = yaw_look_at(actor.position, target) {
        actor.target_orientation = facing;
    }
    let from = actor.position;
    let clip = locomotion.clip(actor).to_string();
    if actor.mixer.set_clip(&clip, config.crossfade_seconds) == ClipSwitch::UnknownClip {
        debug!(actor = actor_id.0, "locomotion_clip_missing");
    }

    let tween = state
        .tweens
        .replace(actor_id, from, target, duration_seconds);
    let request_id = state.allocate_request_id();
    let superseded = state.requests.insert(
        actor_id,
        NavigationRequest {
            request_id,
            actor: actor_id,
            target,
            duration_seconds,
            started_at_seconds: state.tweens.now_seconds(),
            locomotion,
            tween,
        },
    );
    info!(
        actor = actor_id.0,
        request_id,
        superseded = superseded.map(|previous| previous.request_id),
        locomotion = locomotion.label(),
        distance,
        duration_seconds,
        "navigation_started"
    );

    Some(ClickOutcome::Navigating {
        actor: actor_id,
        request_id,
        target,
        duration_seconds,
        locomotion,
    })
}

/// Applies a finished tween. Completions from superseded requests are
/// dropped so they cannot overwrite the newer request's clip.
pub(crate) fn complete_navigation(
    state: &mut StageState,
    completion: TweenCompletion<ActorId>,
) -> bool {
    let is_current = state
        .requests
        .get(&completion.key)
        .is_some_and(|request| request.tween == completion.id);
    if !is_current {
        debug!(actor = completion.key.0, tween = completion.id.0, "navigation_completion_stale");
        return false;
    }
    let request = state.requests.remove(&completion.key);

    let arrival = state.arrival;
    let crossfade = state.config.crossfade_seconds;
    let Some(actor) = state.roster.get_mut(completion.key) else {
        return false;
    };
    actor.position = completion.value;
    match (arrival, actor.locomotion.idle.clone()) {
        (ArrivalBehavior::Idle, Some(idle)) => {
            actor.mixer.set_clip(&idle, crossfade);
        }
        _ => {
            actor.mixer.stop_active(crossfade);
        }
    }
    info!(
        actor = completion.key.0,
        request_id = request.map(|request| request.request_id),
        x = completion.value.x,
        z = completion.value.z,
        "navigation_arrived"
    );
    true
}
