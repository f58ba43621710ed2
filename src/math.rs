//! Coordinate-space helpers.
//!
//! Render space is right-handed with Y up. The route frame delivered by the
//! data provider is vehicle-relative with X forward, Y left, Z up.

use glam::{Mat3, Mat4, Quat, Vec2, Vec3};

/// Near clipping plane distance in meters.
pub const NEAR_PLANE: f32 = 0.1;

/// Far clipping plane distance in meters.
pub const FAR_PLANE: f32 = 1000.0;

/// Camera orientation from vehicle attitude, yaw fixed at zero.
///
/// Composes `(roll - 90°)` about Y with `-pitch` about X. With zero roll the
/// camera looks down +X and a positive pitch tilts it toward the ground.
pub fn camera_orientation(pitch: f32, roll: f32) -> Quat {
    Quat::from_rotation_y(roll - std::f32::consts::FRAC_PI_2) * Quat::from_rotation_x(-pitch)
}

/// View matrix for a camera at `position` with `rotation`: `rotation⁻¹ · translation⁻¹`.
pub fn view_matrix(position: Vec3, rotation: Quat) -> Mat4 {
    Mat4::from_quat(rotation.inverse()) * Mat4::from_translation(-position)
}

/// Right-handed perspective projection with depth range [0, 1].
pub fn perspective_rh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_y, aspect, near, far)
}

/// Transpose of the inverse of the upper 3x3 of `model`.
pub fn normal_matrix(model: &Mat4) -> Mat3 {
    Mat3::from_mat4(*model).inverse().transpose()
}

/// Pack a 3x3 matrix as three 16-byte aligned columns for uniform upload.
pub fn mat3_to_padded_cols(m: &Mat3) -> [[f32; 4]; 3] {
    [
        m.x_axis.extend(0.0).to_array(),
        m.y_axis.extend(0.0).to_array(),
        m.z_axis.extend(0.0).to_array(),
    ]
}

/// Route frame `(x, y, z)` to render space `(x, z, -y)`.
pub fn route_to_render(p: Vec3) -> Vec3 {
    Vec3::new(p.x, p.z, -p.y)
}

/// Render space back to the route frame.
pub fn render_to_route(p: Vec3) -> Vec3 {
    Vec3::new(p.x, -p.z, p.y)
}

/// Map a pixel in a frame of `frame_size` onto a view of `view_size` that
/// shows the frame scaled to fill, cropping the overflow symmetrically.
pub fn aspect_fill(point: Vec2, frame_size: Vec2, view_size: Vec2) -> Vec2 {
    if frame_size.x <= 0.0 || frame_size.y <= 0.0 {
        return point;
    }
    let scale = (view_size.x / frame_size.x).max(view_size.y / frame_size.y);
    let offset = (view_size - frame_size * scale) * 0.5;
    point * scale + offset
}
