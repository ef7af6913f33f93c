//! Perspective camera with cached projection.

use glam::{Mat4, Vec3};

use crate::params::CameraConfig;

/// Perspective camera looking at a target point
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    target: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self {
            fov_degrees: config.fov_degrees,
            aspect,
            near: config.near_plane,
            far: config.far_plane,
            position: config.initial_position,
            target: Vec3::ZERO,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    /// Recompute the projection after changing fov, aspect or planes
    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        );
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// World-to-view transform. Y stays up unless the view axis is vertical.
    pub fn view(&self) -> Mat4 {
        let forward = (self.target - self.position).normalize_or_zero();
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-8 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(self.position, self.target, up)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_tracks_aspect() {
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 1.0);
        let square = camera.projection();

        camera.aspect = 16.0 / 9.0;
        camera.update_projection_matrix();
        assert_ne!(camera.projection(), square);
        // x scale shrinks by the aspect ratio
        let ratio = square.x_axis.x / camera.projection().x_axis.x;
        assert!((ratio - 16.0 / 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_view_proj_generation() {
        let camera = PerspectiveCamera::new(&CameraConfig::default(), 1280.0 / 720.0);
        let view_proj = camera.view_proj();

        // Matrix should not be identity or zero
        assert_ne!(view_proj, Mat4::IDENTITY);
        assert_ne!(view_proj, Mat4::ZERO);
        assert!(view_proj.is_finite());
    }

    #[test]
    fn test_vertical_view_stays_finite() {
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 1.0);
        camera.position = Vec3::new(0.0, 5.0, 0.0);
        camera.look_at(Vec3::ZERO);
        assert!(camera.view().is_finite());
    }

    #[test]
    fn test_target_projects_to_screen_center() {
        let mut camera = PerspectiveCamera::new(&CameraConfig::default(), 1.5);
        camera.position = Vec3::new(3.0, 1.0, 4.0);
        camera.look_at(Vec3::ZERO);

        let clip = camera.view_proj() * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
    }
}
