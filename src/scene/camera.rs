//! Camera driven by vehicle attitude

use glam::{Mat4, Quat, Vec3};

use crate::math;
use crate::provider::CameraParams;

/// Perspective camera mounted on the vehicle
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: math::camera_orientation(0.0, 0.0),
            fov_y: std::f32::consts::FRAC_PI_3,
            aspect: 16.0 / 9.0,
            near: math::NEAR_PLANE,
            far: math::FAR_PLANE,
        }
    }
}

impl Camera {
    pub fn new(near: f32, far: f32) -> Self {
        Self {
            near,
            far,
            ..Default::default()
        }
    }

    /// Apply this tick's camera parameters.
    ///
    /// The camera sits `height` meters above the render origin; orientation
    /// comes from pitch and roll only.
    pub fn update(&mut self, params: &CameraParams) {
        self.position = Vec3::new(0.0, params.height, 0.0);
        self.rotation = math::camera_orientation(params.pitch, params.roll);
        self.fov_y = params.vertical_fov;
        self.aspect = params.aspect_ratio;
    }

    pub fn projection_matrix(&self) -> Mat4 {
        math::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_matrix(&self) -> Mat4 {
        math::view_matrix(self.position, self.rotation)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }
}
