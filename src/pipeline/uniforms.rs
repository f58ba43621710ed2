//! Per-draw uniform records
//!
//! Layouts match `VertexUniforms` and `FragmentUniforms` in the mesh shader.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::math;
use crate::resources::Material;
use crate::scene::{ArrowControlPoints, Camera, GpuLightData, Light};

/// Vertex uniforms for plain lit meshes
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MeshVertexUniforms {
    pub view_projection: Mat4,
    pub model: Mat4,
    pub normal_matrix: [[f32; 4]; 3],
}

impl MeshVertexUniforms {
    pub fn new(view_projection: Mat4, model: Mat4) -> Self {
        Self {
            view_projection,
            model,
            normal_matrix: math::mat3_to_padded_cols(&math::normal_matrix(&model)),
        }
    }
}

/// Vertex uniforms for the arrow: the mesh block followed by the curve
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ArrowVertexUniforms {
    pub mesh: MeshVertexUniforms,
    pub control_points: [Vec4; 4],
}

impl ArrowVertexUniforms {
    pub fn new(view_projection: Mat4, model: Mat4, points: &ArrowControlPoints) -> Self {
        Self {
            mesh: MeshVertexUniforms::new(view_projection, model),
            control_points: points.to_gpu_data(),
        }
    }
}

/// Fragment uniforms shared by every lit pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FragmentUniforms {
    pub camera_position: Vec3,
    pub opacity: f32,
    pub ambient_color: Vec3,
    pub specular_power: f32,
    pub specular_color: Vec3,
    pub _pad0: f32,
    pub base_color: Vec4,
    pub light: GpuLightData,
}

impl FragmentUniforms {
    pub fn new(camera: &Camera, material: &Material, light: &Light) -> Self {
        Self {
            camera_position: camera.position,
            opacity: material.opacity(),
            ambient_color: material.ambient_color,
            specular_power: material.specular_power,
            specular_color: material.specular_color,
            _pad0: 0.0,
            base_color: material.diffuse_color,
            light: light.to_gpu_data(),
        }
    }
}

/// Size of the per-draw vertex uniform buffer; large enough for either layout.
pub const VERTEX_UNIFORM_SIZE: u64 = std::mem::size_of::<ArrowVertexUniforms>() as u64;

pub const FRAGMENT_UNIFORM_SIZE: u64 = std::mem::size_of::<FragmentUniforms>() as u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_shader() {
        assert_eq!(std::mem::size_of::<MeshVertexUniforms>(), 176);
        assert_eq!(std::mem::size_of::<ArrowVertexUniforms>(), 240);
        assert_eq!(std::mem::size_of::<FragmentUniforms>(), 96);
        assert_eq!(std::mem::offset_of!(FragmentUniforms, base_color), 48);
        assert_eq!(std::mem::offset_of!(ArrowVertexUniforms, control_points), 176);
    }

    #[test]
    fn fragment_opacity_is_color_alpha() {
        let material = Material::arrow(Vec4::new(0.1, 0.2, 0.3, 0.4));
        let light = Light::default();
        let mut camera = Camera::default();
        camera.position = Vec3::new(0.0, 1.5, 0.0);
        let u = FragmentUniforms::new(&camera, &material, &light);
        assert!((u.opacity - 0.4).abs() < 1e-6);
        assert_eq!(u.camera_position, Vec3::new(0.0, 1.5, 0.0));
        assert_eq!(u.light.position, Vec4::new(0.0, 7.0, 0.0, 1.0));
        assert_eq!(u.specular_power, 100.0);
    }

    #[test]
    fn normal_matrix_is_inverse_transpose() {
        let model = Mat4::from_scale(Vec3::new(4.0, 1.0, 2.0));
        let u = MeshVertexUniforms::new(Mat4::IDENTITY, model);
        assert!((u.normal_matrix[0][0] - 0.25).abs() < 1e-6);
        assert!((u.normal_matrix[2][2] - 0.5).abs() < 1e-6);
    }
}
