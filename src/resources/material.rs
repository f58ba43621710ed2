//! Blinn-Phong material definitions

use glam::{Vec3, Vec4};

use crate::backend::FrontFace;
use crate::scene::Light;

/// Surface properties of an entity. Copied into each entity, never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Base color; alpha is the draw opacity
    pub diffuse_color: Vec4,
    pub ambient_color: Vec3,
    pub specular_color: Vec3,
    pub specular_power: f32,
    pub front_face: FrontFace,
    /// Overrides the renderer's default light when set
    pub light: Option<Light>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            diffuse_color: Vec4::ONE,
            ambient_color: Vec3::splat(0.1),
            specular_color: Vec3::ONE,
            specular_power: 32.0,
            front_face: FrontFace::Ccw,
            light: None,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_diffuse_color(mut self, color: Vec4) -> Self {
        self.diffuse_color = color;
        self
    }

    pub fn with_ambient_color(mut self, color: Vec3) -> Self {
        self.ambient_color = color;
        self
    }

    pub fn with_specular(mut self, color: Vec3, power: f32) -> Self {
        self.specular_color = color;
        self.specular_power = power;
        self
    }

    pub fn with_front_face(mut self, front_face: FrontFace) -> Self {
        self.front_face = front_face;
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.light = Some(light);
        self
    }

    pub fn opacity(&self) -> f32 {
        self.diffuse_color.w
    }

    /// The material's own light, or `fallback`.
    pub fn resolve_light(&self, fallback: &Light) -> Light {
        self.light.unwrap_or(*fallback)
    }

    // Preset materials

    /// Glossy lane arrow, ambient tinted by its own color
    pub fn arrow(color: Vec4) -> Self {
        Self::new("arrow")
            .with_diffuse_color(color)
            .with_ambient_color(color.truncate())
            .with_specular(Vec3::ONE, 100.0)
    }

    pub fn grid(color: Vec4) -> Self {
        Self::new("grid")
            .with_diffuse_color(color)
            .with_ambient_color(color.truncate())
            .with_specular(Vec3::ONE, 500.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_preset() {
        let color = Vec4::new(0.2745, 0.4117, 0.949, 0.99);
        let m = Material::arrow(color);
        assert_eq!(m.ambient_color, color.truncate());
        assert_eq!(m.specular_power, 100.0);
        assert!((m.opacity() - 0.99).abs() < 1e-6);
        assert_eq!(m.front_face, FrontFace::Ccw);
    }

    #[test]
    fn own_light_wins_over_fallback() {
        let fallback = Light::default();
        let own = Light::new(Vec3::X, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(Material::default().resolve_light(&fallback), fallback);
        assert_eq!(Material::default().with_light(own).resolve_light(&fallback), own);
    }
}
