//! Resource management
//!
//! Meshes, materials, shaders and the camera video texture.

mod material;
mod mesh;
mod shader;
mod texture;

pub use material::*;
pub use mesh::*;
pub use shader::*;
pub use texture::*;
