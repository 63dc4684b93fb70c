//! Perspective camera and avatar framing.

use glam::{Mat4, Vec3};

use crate::config::Config;

/// A perspective camera with a fixed orientation looking down -Z.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn from_config(config: &Config) -> Self {
        Self {
            position: Vec3::from(config.camera.initial_position),
            fov: config.perspective.fov,
            aspect: config.aspect(),
            near: config.perspective.near,
            far: config.perspective.far,
        }
    }

    /// World → view transform. The camera never rotates.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_translation(-self.position)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Place the camera level with the head, `distance` in front of the origin.
///
/// No look-at is applied; the camera keeps looking down -Z.
pub fn frame(camera: &mut Camera, head_world: Vec3, distance: f32) {
    camera.position = Vec3::new(0.0, head_world.y, distance);
    tracing::debug!("Camera framed at {:?}", camera.position);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let camera = Camera::from_config(&Config::default());
        assert_eq!(camera.position, Vec3::new(0.0, 1.0, 5.0));
        assert_eq!(camera.fov, 30.0);
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_frame_ignores_head_x_and_z() {
        let mut camera = Camera::from_config(&Config::default());
        frame(&mut camera, Vec3::new(0.3, 1.42, -0.2), 1.5);
        assert_eq!(camera.position, Vec3::new(0.0, 1.42, 1.5));
    }

    #[test]
    fn test_point_in_front_projects_inside_clip_volume() {
        let mut camera = Camera::from_config(&Config::default());
        frame(&mut camera, Vec3::new(0.0, 1.5, 0.0), 2.0);

        let clip = camera.view_projection() * Vec3::new(0.0, 1.5, 0.0).extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
