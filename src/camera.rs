//! Arcball camera orbiting the particle cluster.

use glam::{Mat4, Vec3};

use crate::system::ViewInfo;

/// Closest the camera may zoom to the rotation point.
pub const MIN_RADIUS: f32 = 0.5;
/// Farthest the camera may zoom out.
pub const MAX_RADIUS: f32 = 40.0;

/// Pitch limit keeping the orbit clear of the poles.
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.05;

const MOUSE_SENSITIVITY: f32 = 0.005;
const SCROLL_SPEED: f32 = 0.3;
const MOVEMENT_SPEED: f32 = 4.0;

/// Discrete camera movement commands from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// Orbit camera: yaw/pitch/distance around a target point.
pub struct ArcBallCamera {
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub target: Vec3,
}

impl ArcBallCamera {
    pub fn new() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.3,
            distance: 6.0,
            target: Vec3::ZERO,
        }
    }

    /// Point the camera orbits around; usually the particle centre.
    pub fn set_rotation_point(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Camera world position derived from the orbit angles.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Eye and forward axis for plane sorting, consistent with
    /// [`view_matrix`](Self::view_matrix).
    pub fn view_info(&self) -> ViewInfo {
        let eye = self.position();
        ViewInfo {
            eye,
            forward: (self.target - eye).normalize_or_zero(),
        }
    }

    /// Orbit by a cursor delta. Pitch is clamped short of the poles so the
    /// view never flips.
    pub fn process_mouse_movement(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * MOUSE_SENSITIVITY;
        self.pitch += dy * MOUSE_SENSITIVITY;
        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Zoom by a scroll delta, clamped to the radius bounds for any input
    /// magnitude.
    pub fn process_mouse_scroll(&mut self, delta: f32) {
        self.distance -= delta * SCROLL_SPEED;
        self.distance = self.distance.clamp(MIN_RADIUS, MAX_RADIUS);
    }

    /// Discrete movement commands: zoom in/out, orbit left/right.
    pub fn process_keyboard(&mut self, movement: CameraMovement, dt: f32) {
        match movement {
            CameraMovement::Forward => {
                self.distance = (self.distance - MOVEMENT_SPEED * dt).clamp(MIN_RADIUS, MAX_RADIUS)
            }
            CameraMovement::Backward => {
                self.distance = (self.distance + MOVEMENT_SPEED * dt).clamp(MIN_RADIUS, MAX_RADIUS)
            }
            CameraMovement::Left => self.yaw -= MOVEMENT_SPEED * dt * 0.25,
            CameraMovement::Right => self.yaw += MOVEMENT_SPEED * dt * 0.25,
        }
    }

    /// Reset orientation when rotations get out of hand.
    pub fn refocus(&mut self) {
        *self = Self {
            target: self.target,
            ..Self::new()
        };
    }
}

impl Default for ArcBallCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_is_always_clamped() {
        let mut camera = ArcBallCamera::new();
        camera.process_mouse_scroll(1.0e6);
        assert_eq!(camera.distance, MIN_RADIUS);
        camera.process_mouse_scroll(-1.0e9);
        assert_eq!(camera.distance, MAX_RADIUS);
        camera.process_mouse_scroll(f32::NAN);
        // Clamp on NaN input keeps the value inside the legal range.
        assert!(camera.distance >= MIN_RADIUS && camera.distance <= MAX_RADIUS);
    }

    #[test]
    fn pitch_never_reaches_the_poles() {
        let mut camera = ArcBallCamera::new();
        for _ in 0..10_000 {
            camera.process_mouse_movement(0.0, 50.0);
        }
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
        for _ in 0..10_000 {
            camera.process_mouse_movement(0.0, -50.0);
        }
        assert!(camera.pitch > -std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn keyboard_zoom_respects_radius_bounds() {
        let mut camera = ArcBallCamera::new();
        for _ in 0..1000 {
            camera.process_keyboard(CameraMovement::Forward, 1.0);
        }
        assert_eq!(camera.distance, MIN_RADIUS);
        for _ in 0..1000 {
            camera.process_keyboard(CameraMovement::Backward, 1.0);
        }
        assert_eq!(camera.distance, MAX_RADIUS);
    }

    #[test]
    fn view_info_matches_view_matrix() {
        let mut camera = ArcBallCamera::new();
        camera.process_mouse_movement(37.0, -12.0);
        let info = camera.view_info();
        assert!((info.eye - camera.position()).length() < 1e-6);
        // Forward points from the eye to the target.
        let expected = (camera.target - camera.position()).normalize();
        assert!((info.forward - expected).length() < 1e-6);
    }

    #[test]
    fn refocus_resets_orientation_but_not_target() {
        let mut camera = ArcBallCamera::new();
        camera.set_rotation_point(Vec3::new(1.0, 2.0, 3.0));
        camera.process_mouse_movement(500.0, 300.0);
        camera.process_mouse_scroll(-20.0);
        camera.refocus();
        assert_eq!(camera.yaw, 0.0);
        assert_eq!(camera.target, Vec3::new(1.0, 2.0, 3.0));
    }
}
