//! Scene lights: a key spotlight and a point fill light.
//!
//! Lights optionally follow the mouse by orbiting the origin, the same way
//! the camera does. Input deltas are applied through explicit calls once
//! per frame; the lighting pass reads the resulting parameters unchanged,
//! so uniforms never see a half-updated light.

use glam::{Quat, Vec3};

const LIGHT_SENSITIVITY: f32 = 0.04;

/// Ambient/diffuse/specular colour triple fed to the lighting uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightColours {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl LightColours {
    pub fn uniform(level: f32) -> Self {
        Self {
            ambient: Vec3::splat(level),
            diffuse: Vec3::splat(level),
            specular: Vec3::splat(level),
        }
    }
}

impl Default for LightColours {
    fn default() -> Self {
        Self {
            ambient: Vec3::new(0.39, 0.20, 0.0),
            diffuse: Vec3::new(0.96, 1.0, 0.67),
            specular: Vec3::new(1.0, 0.04, 0.04),
        }
    }
}

/// Orbit `position` around the origin by yaw/pitch angles derived from a
/// cursor delta. Shared by both light types.
fn orbit_about_origin(position: Vec3, dx: f32, dy: f32) -> Vec3 {
    let yaw = Quat::from_axis_angle(Vec3::Y, -dx * LIGHT_SENSITIVITY);
    // Pitch around the camera-right-ish axis perpendicular to the light arm.
    let arm = position.normalize_or_zero();
    let right = arm.cross(Vec3::Y).normalize_or_zero();
    let pitch = if right == Vec3::ZERO {
        Quat::IDENTITY
    } else {
        Quat::from_axis_angle(right, dy * LIGHT_SENSITIVITY)
    };
    yaw * pitch * position
}

/// Omnidirectional fill light.
#[derive(Debug, Clone)]
pub struct PointLight {
    pub position: Vec3,
    pub colours: LightColours,
    pub follow_mouse: bool,
}

impl PointLight {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            colours: LightColours::uniform(0.1),
            follow_mouse: false,
        }
    }

    /// Orbit the light when mouse-follow is enabled; no-op otherwise.
    pub fn process_mouse_movement(&mut self, dx: f32, dy: f32) {
        if self.follow_mouse {
            self.position = orbit_about_origin(self.position, dx, dy);
        }
    }
}

/// Directed key light with a cone angle.
#[derive(Debug, Clone)]
pub struct SpotLight {
    pub position: Vec3,
    pub colours: LightColours,
    /// Cone angle in degrees; kept within (1, 179).
    cone_angle: f32,
    pub follow_mouse: bool,
}

impl SpotLight {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            colours: LightColours::default(),
            cone_angle: 60.0,
            follow_mouse: false,
        }
    }

    pub fn cone_angle(&self) -> f32 {
        self.cone_angle
    }

    pub fn set_cone_angle(&mut self, degrees: f32) {
        self.cone_angle = degrees.clamp(1.0, 179.0);
    }

    /// Orbit the light when mouse-follow is enabled; no-op otherwise.
    pub fn process_mouse_movement(&mut self, dx: f32, dy: f32) {
        if self.follow_mouse {
            self.position = orbit_about_origin(self.position, dx, dy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_movement_is_noop_unless_following() {
        let mut light = SpotLight::new(Vec3::new(-4.0, 0.0, 0.0));
        light.process_mouse_movement(100.0, 50.0);
        assert_eq!(light.position, Vec3::new(-4.0, 0.0, 0.0));

        light.follow_mouse = true;
        light.process_mouse_movement(100.0, 50.0);
        assert_ne!(light.position, Vec3::new(-4.0, 0.0, 0.0));
    }

    #[test]
    fn orbit_preserves_distance_from_origin() {
        let mut light = PointLight::new(Vec3::new(4.0, 0.0, 0.0));
        light.follow_mouse = true;
        for _ in 0..50 {
            light.process_mouse_movement(13.0, -7.0);
        }
        assert!((light.position.length() - 4.0).abs() < 1e-3);
    }

    #[test]
    fn cone_angle_is_clamped() {
        let mut light = SpotLight::new(Vec3::ZERO);
        light.set_cone_angle(0.0);
        assert_eq!(light.cone_angle(), 1.0);
        light.set_cone_angle(400.0);
        assert_eq!(light.cone_angle(), 179.0);
    }
}
