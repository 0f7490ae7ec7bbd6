use glam::{Quat, Vec2, Vec3};

use super::camera::OrbitCamera;
use super::environment::{Environment, MaterialId};
use super::input::{ActionStates, InputAction};
use super::tools::ParamSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKey {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    SwitchTo(SceneKey),
    HardResetTo(SceneKey),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneDebugCommand {
    ListParams,
    GetParam { name: String },
    SetParam { name: String, value: String },
    PlayClip { clip: String },
    Select { actor_id: u64 },
    DumpState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneDebugCommandResult {
    Unsupported,
    Success(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    Click,
    DoubleClick,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub position_px: Vec2,
}

#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    switch_scene_pressed: bool,
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    pointer_events: Vec<PointerEvent>,
    zoom_delta_steps: i32,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        quit_requested: bool,
        switch_scene_pressed: bool,
        actions: ActionStates,
        cursor_position_px: Option<Vec2>,
        pointer_events: Vec<PointerEvent>,
        zoom_delta_steps: i32,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            quit_requested,
            switch_scene_pressed,
            actions,
            cursor_position_px,
            pointer_events,
            zoom_delta_steps,
            window_width,
            window_height,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn switch_scene_pressed(&self) -> bool {
        self.switch_scene_pressed
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_switch_scene_pressed(mut self, pressed: bool) -> Self {
        self.switch_scene_pressed = pressed;
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_pointer_event(mut self, kind: PointerEventKind, position_px: Vec2) -> Self {
        self.pointer_events.push(PointerEvent { kind, position_px });
        self
    }

    pub fn with_zoom_delta_steps(mut self, zoom_delta_steps: i32) -> Self {
        self.zoom_delta_steps = zoom_delta_steps;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn pointer_events(&self) -> &[PointerEvent] {
        &self.pointer_events
    }

    pub fn zoom_delta_steps(&self) -> i32 {
        self.zoom_delta_steps
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    Icosahedron { radius: f32 },
    TorusKnot { radius: f32, tube: f32 },
}

impl PropShape {
    /// Radius of a sphere enclosing the shape in local space.
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            PropShape::Box { half_extents } => half_extents.length(),
            PropShape::Sphere { radius } | PropShape::Icosahedron { radius } => radius,
            PropShape::TorusKnot { radius, tube } => radius + tube,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FigurePart {
    pub mesh_name: String,
    pub material: Option<MaterialId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderableKind {
    Prop {
        shape: PropShape,
        material: MaterialId,
    },
    /// Animated model drawn as an upright impostor. `stride_phase` is the
    /// active clip's normalized time and drives the walk bob.
    Figure {
        height: f32,
        radius: f32,
        parts: Vec<FigurePart>,
        stride_phase: Option<f32>,
    },
}

#[derive(Debug, Clone)]
pub struct RenderableDesc {
    pub kind: RenderableKind,
    pub debug_name: String,
    pub casts_shadow: bool,
}

impl RenderableDesc {
    pub fn new(kind: RenderableKind, debug_name: impl Into<String>) -> Self {
        Self {
            kind,
            debug_name: debug_name.into(),
            casts_shadow: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugMarkerKind {
    Destination,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugMarker {
    pub kind: DebugMarkerKind,
    pub position_world: Vec3,
    pub ttl_seconds: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneVisualState {
    pub selected_actor: Option<EntityId>,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub transform: Transform,
    pub renderable: RenderableDesc,
    applied_spawn_order: u64,
}

impl Entity {
    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    camera: OrbitCamera,
    environment: Environment,
    visual_state: SceneVisualState,
    debug_markers: Vec<DebugMarker>,
}

impl SceneWorld {
    /// Queues a spawn. The entity becomes visible after [`SceneWorld::apply_pending`].
    pub fn spawn(&mut self, transform: Transform, renderable: RenderableDesc) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            transform,
            renderable,
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_spawns.is_empty() {
            for mut entity in self.pending_spawns.drain(..) {
                entity.applied_spawn_order = self.next_applied_spawn_order;
                self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
                self.entities.push(entity);
            }
        }

        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort_unstable();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.pending_despawns.clear();
        }
    }

    /// Drops entities and per-scene view state. The id allocator keeps
    /// counting so ids are never reused.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_applied_spawn_order = 0;
        self.camera = OrbitCamera::default();
        self.environment = Environment::default();
        self.visual_state = SceneVisualState::default();
        self.debug_markers.clear();
    }

    pub fn set_selected_actor_visual(&mut self, selected: Option<EntityId>) {
        self.visual_state.selected_actor = selected;
    }

    pub fn visual_state(&self) -> &SceneVisualState {
        &self.visual_state
    }

    /// Replaces any marker of the same kind.
    pub fn set_debug_marker(&mut self, marker: DebugMarker) {
        self.debug_markers.retain(|existing| existing.kind != marker.kind);
        self.debug_markers.push(marker);
    }

    pub fn debug_markers(&self) -> &[DebugMarker] {
        &self.debug_markers
    }

    pub fn tick_debug_markers(&mut self, dt_seconds: f32) {
        self.debug_markers.retain_mut(|marker| {
            marker.ttl_seconds -= dt_seconds;
            marker.ttl_seconds > 0.0
        });
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn render(&mut self, _world: &SceneWorld) {}
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
    fn debug_lines(&self, _world: &SceneWorld) -> Option<Vec<String>> {
        None
    }
    /// Tunable values shown in the parameter panel.
    fn params(&self) -> Option<&ParamSet> {
        None
    }
    fn execute_debug_command(
        &mut self,
        _command: SceneDebugCommand,
        _world: &mut SceneWorld,
    ) -> SceneDebugCommandResult {
        SceneDebugCommandResult::Unsupported
    }
}

struct SceneRuntime {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

impl SceneRuntime {
    fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            world: SceneWorld::default(),
            is_loaded: false,
        }
    }

    fn load(&mut self) {
        let (scene, world) = (&mut self.scene, &mut self.world);
        scene.load(world);
        self.is_loaded = true;
    }

    fn unload(&mut self) {
        if self.is_loaded {
            let (scene, world) = (&mut self.scene, &mut self.world);
            scene.unload(world);
        }
        self.world.clear();
        self.is_loaded = false;
    }
}

pub(crate) struct SceneMachine {
    scene_a: SceneRuntime,
    scene_b: SceneRuntime,
    active_scene: SceneKey,
}

impl SceneMachine {
    pub(crate) fn new(
        scene_a: Box<dyn Scene>,
        scene_b: Box<dyn Scene>,
        active_scene: SceneKey,
    ) -> Self {
        Self {
            scene_a: SceneRuntime::new(scene_a),
            scene_b: SceneRuntime::new(scene_b),
            active_scene,
        }
    }

    pub(crate) fn active_scene(&self) -> SceneKey {
        self.active_scene
    }

    pub(crate) fn load_active(&mut self) {
        self.load_scene_if_needed(self.active_scene);
    }

    pub(crate) fn update_active(&mut self, dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        let runtime = self.active_runtime_mut();
        let (scene, world) = (&mut runtime.scene, &mut runtime.world);
        scene.update(dt_seconds, input, world)
    }

    pub(crate) fn apply_pending_active(&mut self) {
        self.active_runtime_mut().world.apply_pending();
    }

    pub(crate) fn render_active(&mut self) {
        let runtime = self.active_runtime_mut();
        runtime.scene.render(&runtime.world);
    }

    pub(crate) fn active_world(&self) -> &SceneWorld {
        &self.active_runtime_ref().world
    }

    #[cfg(test)]
    pub(crate) fn active_world_mut(&mut self) -> &mut SceneWorld {
        &mut self.active_runtime_mut().world
    }

    pub(crate) fn debug_title_active(&self) -> Option<String> {
        let runtime = self.active_runtime_ref();
        runtime.scene.debug_title(&runtime.world)
    }

    pub(crate) fn debug_lines_active(&self) -> Option<Vec<String>> {
        let runtime = self.active_runtime_ref();
        runtime.scene.debug_lines(&runtime.world)
    }

    pub(crate) fn params_active(&self) -> Option<&ParamSet> {
        self.active_runtime_ref().scene.params()
    }

    pub(crate) fn execute_debug_command_active(
        &mut self,
        command: SceneDebugCommand,
    ) -> SceneDebugCommandResult {
        let runtime = self.active_runtime_mut();
        runtime
            .scene
            .execute_debug_command(command, &mut runtime.world)
    }

    pub(crate) fn switch_to(&mut self, next_scene: SceneKey) -> bool {
        if self.active_scene == next_scene {
            return false;
        }

        self.load_scene_if_needed(next_scene);
        self.active_scene = next_scene;
        true
    }

    pub(crate) fn hard_reset_to(&mut self, next_scene: SceneKey) -> bool {
        let runtime = self.runtime_mut(next_scene);
        runtime.unload();
        runtime.load();
        let changed = self.active_scene != next_scene;
        self.active_scene = next_scene;
        changed
    }

    pub(crate) fn shutdown_all(&mut self) {
        for runtime in [&mut self.scene_a, &mut self.scene_b] {
            if runtime.is_loaded {
                runtime.unload();
            }
        }
    }

    fn load_scene_if_needed(&mut self, key: SceneKey) {
        let runtime = self.runtime_mut(key);
        if !runtime.is_loaded {
            runtime.load();
        }
    }

    fn active_runtime_mut(&mut self) -> &mut SceneRuntime {
        self.runtime_mut(self.active_scene)
    }

    fn active_runtime_ref(&self) -> &SceneRuntime {
        self.runtime_ref(self.active_scene)
    }

    fn runtime_mut(&mut self, key: SceneKey) -> &mut SceneRuntime {
        match key {
            SceneKey::A => &mut self.scene_a,
            SceneKey::B => &mut self.scene_b,
        }
    }

    fn runtime_ref(&self, key: SceneKey) -> &SceneRuntime {
        match key {
            SceneKey::A => &self.scene_a,
            SceneKey::B => &self.scene_b,
        }
    }
}
