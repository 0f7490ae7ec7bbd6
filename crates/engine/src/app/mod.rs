mod animation;
mod camera;
mod environment;
mod input;
mod loop_runner;
mod metrics;
mod physics;
mod raycast;
mod rendering;
mod scene;
mod tools;
mod tween;

pub use animation::{AnimationClip, AnimationMixer, ClipSwitch};
pub use camera::{
    pointer_to_ndc, OrbitCamera, CAMERA_FAR, CAMERA_FOV_Y_DEGREES, CAMERA_MAX_DISTANCE,
    CAMERA_MIN_DISTANCE, CAMERA_NEAR, CAMERA_ORBIT_RADIANS_PER_SECOND, CAMERA_ZOOM_STEP_FACTOR,
};
pub use environment::{
    DirectionalLight, Environment, MaterialId, ToonMaterial, DEFAULT_OUTLINE_ALPHA,
    DEFAULT_OUTLINE_COLOR, DEFAULT_SCENE_COLOR, DEFAULT_SHADOW_COLOR,
};
pub use input::{ActionStates, InputAction};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use physics::{BodyHandle, ColliderShape, PhysicsWorld, RigidBodyDesc, DEFAULT_GRAVITY_Y};
pub use raycast::{cast_scene_ray, ActorHitVolume, GroundPlane, Ray, RayHit, GROUND_HALF_EXTENT};
pub use rendering::Renderer;
pub use scene::{
    DebugMarker, DebugMarkerKind, Entity, EntityId, EntityIdAllocator, FigurePart, InputSnapshot,
    PointerEvent, PointerEventKind, PropShape, RenderableDesc, RenderableKind, Scene,
    SceneCommand, SceneDebugCommand, SceneDebugCommandResult, SceneKey, SceneVisualState,
    SceneWorld, Transform,
};
pub(crate) use tools::{ConsoleState, OverlayData};
pub use tools::{ParamError, ParamKind, ParamSet, ParamSpec, ParamValue};
pub use tween::{TweenCompletion, TweenId, TweenSet};
