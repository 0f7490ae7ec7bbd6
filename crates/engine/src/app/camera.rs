use glam::{Mat4, Vec2, Vec3, Vec4};

use super::input::InputAction;
use super::raycast::Ray;
use super::scene::InputSnapshot;

pub const CAMERA_FOV_Y_DEGREES: f32 = 45.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 1000.0;
pub const CAMERA_MIN_DISTANCE: f32 = 10.0;
pub const CAMERA_MAX_DISTANCE: f32 = 23.0;
pub const CAMERA_ZOOM_STEP_FACTOR: f32 = 0.9;
pub const CAMERA_ORBIT_RADIANS_PER_SECOND: f32 = 1.5;
const CAMERA_MIN_PITCH: f32 = 0.05;
const CAMERA_MAX_PITCH: f32 = 1.45;

/// Perspective camera orbiting a fixed target.
///
/// Orientation is stored as yaw/pitch/distance around `target`; yaw zero puts
/// the eye on the +Z side of the target looking toward -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    yaw: f32,
    pitch: f32,
    distance: f32,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    aspect: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::looking_at(Vec3::new(0.0, 8.0, 15.0), Vec3::new(0.0, 3.0, 0.0))
    }
}

impl OrbitCamera {
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let mut camera = Self {
            target,
            yaw: 0.0,
            pitch: 0.0,
            distance: CAMERA_MIN_DISTANCE,
            fov_y_radians: CAMERA_FOV_Y_DEGREES.to_radians(),
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
            aspect: 16.0 / 9.0,
        };
        camera.set_eye(eye);
        camera
    }

    pub fn eye(&self) -> Vec3 {
        let horizontal = self.pitch.cos() * self.distance;
        self.target
            + Vec3::new(
                horizontal * self.yaw.sin(),
                self.pitch.sin() * self.distance,
                horizontal * self.yaw.cos(),
            )
    }

    /// Re-derives the orbit from an eye position; distance is clamped to the
    /// orbit limits, pitch is not.
    pub fn set_eye(&mut self, eye: Vec3) {
        let offset = eye - self.target;
        let length = offset.length();
        if !length.is_finite() || length <= f32::EPSILON {
            return;
        }
        self.distance = length.clamp(CAMERA_MIN_DISTANCE, CAMERA_MAX_DISTANCE);
        self.pitch = (offset.y / length).clamp(-1.0, 1.0).asin();
        self.yaw = offset.x.atan2(offset.z);
    }

    pub fn set_eye_z(&mut self, z: f32) {
        if !z.is_finite() {
            return;
        }
        let mut eye = self.eye();
        eye.z = z;
        self.set_eye(eye);
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect_from_window(&mut self, window_size: (u32, u32)) {
        let (width, height) = window_size;
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        if yaw_delta.is_finite() {
            self.yaw = (self.yaw + yaw_delta).rem_euclid(std::f32::consts::TAU);
        }
        if pitch_delta.is_finite() {
            self.pitch = (self.pitch + pitch_delta).clamp(CAMERA_MIN_PITCH, CAMERA_MAX_PITCH);
        }
    }

    pub fn apply_zoom_steps(&mut self, steps: i32) {
        if steps == 0 {
            return;
        }
        let factor = CAMERA_ZOOM_STEP_FACTOR.powi(steps);
        self.distance = (self.distance * factor).clamp(CAMERA_MIN_DISTANCE, CAMERA_MAX_DISTANCE);
    }

    /// Keyboard orbit and wheel zoom for one frame.
    pub fn apply_input(&mut self, input: &InputSnapshot, dt_seconds: f32) {
        let step = CAMERA_ORBIT_RADIANS_PER_SECOND * dt_seconds.max(0.0);
        let mut yaw_delta = 0.0;
        let mut pitch_delta = 0.0;
        if input.is_down(InputAction::OrbitLeft) {
            yaw_delta -= step;
        }
        if input.is_down(InputAction::OrbitRight) {
            yaw_delta += step;
        }
        if input.is_down(InputAction::OrbitUp) {
            pitch_delta += step;
        }
        if input.is_down(InputAction::OrbitDown) {
            pitch_delta -= step;
        }
        if yaw_delta != 0.0 || pitch_delta != 0.0 {
            self.orbit(yaw_delta, pitch_delta);
        }
        self.apply_zoom_steps(input.zoom_delta_steps());
        self.set_aspect_from_window(input.window_size());
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_radians, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Ray from the eye through a point in normalized device coordinates.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inverse = self.view_projection().inverse();
        let far_point = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        let eye = self.eye();
        Ray::new(eye, far_point - eye)
    }

    /// Projects a world point to pixel coordinates plus view depth. Points
    /// behind the near plane return `None`.
    pub fn project_to_screen(&self, world: Vec3, window_size: (u32, u32)) -> Option<(Vec2, f32)> {
        let (width, height) = window_size;
        if width == 0 || height == 0 {
            return None;
        }
        let clip = self.view_projection() * Vec4::new(world.x, world.y, world.z, 1.0);
        if clip.w <= self.near {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let x = (ndc.x + 1.0) * 0.5 * width as f32;
        let y = (1.0 - ndc.y) * 0.5 * height as f32;
        Some((Vec2::new(x, y), clip.w))
    }

    /// Pixels covered by one world unit at the given view depth.
    pub fn pixels_per_unit_at_depth(&self, depth: f32, window_height: u32) -> f32 {
        if depth <= f32::EPSILON {
            return 0.0;
        }
        let view_height = 2.0 * depth * (self.fov_y_radians * 0.5).tan();
        window_height as f32 / view_height
    }
}

pub fn pointer_to_ndc(position_px: Vec2, window_size: (u32, u32)) -> Option<Vec2> {
    let (width, height) = window_size;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Vec2::new(
        position_px.x / width as f32 * 2.0 - 1.0,
        -(position_px.y / height as f32) * 2.0 + 1.0,
    ))
}
