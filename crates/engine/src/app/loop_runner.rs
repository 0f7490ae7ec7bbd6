use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec2;
use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::StartupError;

use super::input::ActionStates;
use super::metrics::{FrameTimings, MetricsAccumulator};
use super::rendering::DebugLayers;
use super::scene::SceneMachine;
use super::tools::{ConsoleCommandProcessor, DebugCommand};
use super::{
    ConsoleState, InputAction, InputSnapshot, MetricsHandle, OverlayData, PointerEvent,
    PointerEventKind, Renderer, Scene, SceneCommand, SceneDebugCommandResult, SceneKey,
};

pub const SLOW_FRAME_ENV_VAR: &str = "TOONSTAGE_SLOW_FRAME_MS";

pub(crate) const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);
pub(crate) const DOUBLE_CLICK_MAX_DISTANCE_PX: f32 = 6.0;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    /// Upper bound on the delta handed to a scene update.
    pub max_frame_delta: Duration,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "toonstage".to_string(),
            window_width: 1280,
            window_height: 720,
            max_frame_delta: Duration::from_millis(100),
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(
    config: LoopConfig,
    scene_a: Box<dyn Scene>,
    scene_b: Box<dyn Scene>,
) -> Result<(), AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, scene_a, scene_b, metrics_handle)
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    scene_a: Box<dyn Scene>,
    scene_b: Box<dyn Scene>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let mut scenes = SceneMachine::new(scene_a, scene_b, SceneKey::A);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(100));
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    let (initial_width, initial_height) = renderer.size();
    let mut input_collector = InputCollector::new(initial_width, initial_height);
    let mut console = ConsoleState::default();
    let mut command_processor = ConsoleCommandProcessor::new();
    console.set_completion_names(command_processor.command_names());
    let mut debug_commands = Vec::new();

    scenes.load_active();
    scenes.apply_pending_active();
    info!(
        scene = ?scenes.active_scene(),
        entity_count = scenes.active_world().entity_count(),
        "scene_loaded"
    );
    info!(
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        "loop_config"
    );

    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut last_applied_title: Option<String> = None;
    let mut overlay_visible = true;
    let mut param_panel_visible = true;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    input_collector.mark_quit_requested();
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    input_collector.set_window_size(new_size.width, new_size.height);
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    input_collector.set_window_size(size.width, size.height);
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input_collector.set_cursor_position_px(position.x as f32, position.y as f32);
                }
                WindowEvent::CursorLeft { .. } => {
                    input_collector.clear_cursor_position();
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    input_collector.handle_mouse_input(button, state, Instant::now());
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    input_collector.handle_mouse_wheel(delta);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if is_console_toggle_key(&event) {
                        if event.state == ElementState::Pressed && !event.repeat {
                            console.toggle_open();
                            input_collector.release_all_actions();
                            info!(console_open = console.is_open(), "console_toggled");
                        }
                    } else if console.is_open() {
                        console.handle_key_event(&event);
                        console.handle_text_input_from_key_event(&event);
                    } else {
                        input_collector.handle_keyboard_input(&event);
                        if input_collector.quit_requested {
                            info!(reason = "escape_key", "shutdown_requested");
                            window_target.exit();
                        }
                    }
                }
                WindowEvent::RedrawRequested => {
                    if input_collector.overlay_toggle.take() {
                        overlay_visible = !overlay_visible;
                        info!(overlay_visible, "overlay_toggled");
                    }
                    if input_collector.param_panel_toggle.take() {
                        param_panel_visible = !param_panel_visible;
                        info!(param_panel_visible, "param_panel_toggled");
                    }

                    if slow_frame_delay > Duration::ZERO {
                        // Explicit debug perturbation only; this is not the FPS cap.
                        thread::sleep(slow_frame_delay);
                    }

                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;
                    let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);
                    if clamped_frame_dt < raw_frame_dt {
                        debug!(
                            raw_frame_ms = raw_frame_dt.as_millis() as u64,
                            clamped_frame_ms = clamped_frame_dt.as_millis() as u64,
                            "frame_delta_clamped"
                        );
                    }

                    let update_started = Instant::now();
                    command_processor.process_pending_lines(&mut console);
                    command_processor.drain_pending_debug_commands_into(&mut debug_commands);
                    for command in debug_commands.drain(..) {
                        if apply_debug_command(command, &mut scenes, &mut console) {
                            info!(reason = "console_quit", "shutdown_requested");
                            window_target.exit();
                        }
                    }

                    let input_snapshot = input_collector.snapshot_for_frame();
                    let command =
                        scenes.update_active(clamped_frame_dt.as_secs_f32(), &input_snapshot);
                    scenes.apply_pending_active();
                    apply_scene_command(command, &mut scenes);
                    let update_elapsed = update_started.elapsed();

                    // Single authoritative FPS cap sleep point for render pacing.
                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    let render_started = Instant::now();
                    scenes.render_active();
                    let overlay = overlay_visible.then(|| OverlayData {
                        metrics: metrics_handle.snapshot(),
                        render_fps_cap: effective_render_cap,
                        slow_frame_delay_ms: slow_frame_delay.as_millis() as u64,
                        entity_count: scenes.active_world().entity_count(),
                        scene_title: scenes.debug_title_active(),
                        scene_lines: scenes.debug_lines_active(),
                    });
                    let layers = DebugLayers {
                        params: if param_panel_visible && !console.is_open() {
                            scenes.params_active()
                        } else {
                            None
                        },
                        overlay: overlay.as_ref(),
                        console: Some(&console),
                    };
                    if let Err(error) = renderer.render_world(scenes.active_world(), layers) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    let render_elapsed = render_started.elapsed();
                    last_present_instant = Instant::now();

                    let next_title = scenes.debug_title_active();
                    if next_title != last_applied_title {
                        match &next_title {
                            Some(title) => window.set_title(&format!(
                                "{} - {}",
                                config.window_title, title
                            )),
                            None => window.set_title(&config.window_title),
                        }
                        last_applied_title = next_title;
                    }

                    metrics_accumulator.record_frame(FrameTimings {
                        frame: raw_frame_dt,
                        update: update_elapsed,
                        render: render_elapsed,
                    });
                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            frame_time_ms = snapshot.frame_time_ms,
                            max_frame_time_ms = snapshot.max_frame_time_ms,
                            update_ms = snapshot.update_ms,
                            render_ms = snapshot.render_ms,
                            entity_count = scenes.active_world().entity_count(),
                            scene = ?scenes.active_scene(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                scenes.shutdown_all();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn apply_scene_command(command: SceneCommand, scenes: &mut SceneMachine) {
    let switched = match command {
        SceneCommand::SwitchTo(next_scene) => scenes.switch_to(next_scene),
        SceneCommand::HardResetTo(next_scene) => scenes.hard_reset_to(next_scene),
        SceneCommand::None => return,
    };
    scenes.apply_pending_active();
    info!(
        scene = ?scenes.active_scene(),
        switched,
        entity_count = scenes.active_world().entity_count(),
        "scene_switched"
    );
}

/// Applies one queued console command. Returns `true` when the app should quit.
fn apply_debug_command(
    command: DebugCommand,
    scenes: &mut SceneMachine,
    console: &mut ConsoleState,
) -> bool {
    match command {
        DebugCommand::Quit => return true,
        DebugCommand::ResetScene => {
            let active = scenes.active_scene();
            apply_scene_command(SceneCommand::HardResetTo(active), scenes);
            console.append_output_line(format!("reset scene {active:?}"));
        }
        DebugCommand::SwitchScene { scene } => {
            apply_scene_command(SceneCommand::SwitchTo(scene), scenes);
            console.append_output_line(format!("active scene {:?}", scenes.active_scene()));
        }
        DebugCommand::Scene(scene_command) => {
            match scenes.execute_debug_command_active(scene_command) {
                SceneDebugCommandResult::Success(text) => {
                    for line in text.lines() {
                        console.append_output_line(line);
                    }
                }
                SceneDebugCommandResult::Error(message) => {
                    console.append_output_line(format!("error: {message}"));
                }
                SceneDebugCommandResult::Unsupported => {
                    console.append_output_line("error: not supported by active scene");
                }
            }
        }
    }
    false
}

/// Press/release tracking that reports each press once.
#[derive(Debug, Default, Clone, Copy)]
struct KeyEdge {
    is_down: bool,
    pressed_edge: bool,
}

impl KeyEdge {
    fn update(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.is_down {
                    self.pressed_edge = true;
                }
                self.is_down = true;
            }
            ElementState::Released => self.is_down = false,
        }
    }

    fn take(&mut self) -> bool {
        std::mem::take(&mut self.pressed_edge)
    }
}

/// Turns left-button presses into click or double-click events: a press
/// within [`DOUBLE_CLICK_WINDOW`] and [`DOUBLE_CLICK_MAX_DISTANCE_PX`] of the
/// previous single click is a double click.
#[derive(Debug, Default)]
struct ClickTracker {
    last_click: Option<(Instant, Vec2)>,
}

impl ClickTracker {
    fn register_press(&mut self, at: Instant, position_px: Vec2) -> PointerEventKind {
        if let Some((last_at, last_position)) = self.last_click.take() {
            let within_window = at.saturating_duration_since(last_at) <= DOUBLE_CLICK_WINDOW;
            let within_distance =
                last_position.distance(position_px) <= DOUBLE_CLICK_MAX_DISTANCE_PX;
            if within_window && within_distance {
                return PointerEventKind::DoubleClick;
            }
        }
        self.last_click = Some((at, position_px));
        PointerEventKind::Click
    }
}

#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    tab: KeyEdge,
    overlay_toggle: KeyEdge,
    param_panel_toggle: KeyEdge,
    pending_zoom_steps: i32,
    action_states: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_mouse_is_down: bool,
    click_tracker: ClickTracker,
    pending_pointer_events: Vec<PointerEvent>,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        let PhysicalKey::Code(code) = key_event.physical_key else {
            return;
        };
        self.handle_key_code(code, key_event.state);
    }

    fn handle_key_code(&mut self, code: KeyCode, state: ElementState) {
        let is_pressed = state == ElementState::Pressed;
        match code {
            KeyCode::Tab => self.tab.update(state),
            KeyCode::F3 => self.overlay_toggle.update(state),
            KeyCode::F1 => self.param_panel_toggle.update(state),
            KeyCode::KeyJ => self.action_states.set(InputAction::OrbitLeft, is_pressed),
            KeyCode::KeyL => self.action_states.set(InputAction::OrbitRight, is_pressed),
            KeyCode::KeyI => self.action_states.set(InputAction::OrbitUp, is_pressed),
            KeyCode::KeyK => self.action_states.set(InputAction::OrbitDown, is_pressed),
            KeyCode::Escape => {
                self.action_states.set(InputAction::Quit, is_pressed);
                if is_pressed {
                    self.mark_quit_requested();
                }
            }
            _ => {}
        }
    }

    /// Held keys stop counting once keyboard focus moves to the console.
    fn release_all_actions(&mut self) {
        self.action_states = ActionStates::default();
    }

    fn snapshot_for_frame(&mut self) -> InputSnapshot {
        InputSnapshot::new(
            self.quit_requested,
            self.tab.take(),
            self.action_states,
            self.cursor_position_px,
            std::mem::take(&mut self.pending_pointer_events),
            std::mem::take(&mut self.pending_zoom_steps),
            self.window_width,
            self.window_height,
        )
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    fn set_cursor_position_px(&mut self, x: f32, y: f32) {
        self.cursor_position_px = Some(Vec2::new(x, y));
    }

    fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    fn handle_mouse_wheel(&mut self, delta: MouseScrollDelta) {
        // Wheel up zooms in, which shortens the orbit distance.
        let steps = zoom_steps_from_scroll_delta(delta);
        self.pending_zoom_steps = self.pending_zoom_steps.saturating_add(steps);
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState, at: Instant) {
        if button != MouseButton::Left {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.left_mouse_is_down {
                    if let Some(position_px) = self.cursor_position_px {
                        let kind = self.click_tracker.register_press(at, position_px);
                        self.pending_pointer_events
                            .push(PointerEvent { kind, position_px });
                    }
                }
                self.left_mouse_is_down = true;
            }
            ElementState::Released => self.left_mouse_is_down = false,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}

fn is_console_toggle_key(key_event: &KeyEvent) -> bool {
    matches!(key_event.physical_key, PhysicalKey::Code(KeyCode::Backquote))
}

fn zoom_steps_from_scroll_delta(delta: MouseScrollDelta) -> i32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y.round() as i32,
        MouseScrollDelta::PixelDelta(position) => {
            if position.y > 0.0 {
                1
            } else if position.y < 0.0 {
                -1
            } else {
                0
            }
        }
    }
}
