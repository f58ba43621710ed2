//! Point light used for forward shading

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// A light with a color and a world-space position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub color: Vec3,
    pub position: Vec3,
}

impl Default for Light {
    /// White light seven meters above the origin
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            position: Vec3::new(0.0, 7.0, 0.0),
        }
    }
}

impl Light {
    pub fn new(color: Vec3, position: Vec3) -> Self {
        Self { color, position }
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self) -> GpuLightData {
        GpuLightData {
            color: self.color.extend(1.0),
            position: self.position.extend(1.0),
        }
    }
}

/// Light data as laid out in the fragment uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLightData {
    pub color: Vec4,
    pub position: Vec4,
}
