//! Renderer construction and scene population errors

use thiserror::Error;

use crate::backend::BackendError;
use crate::scene::SceneError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RendererError {
    #[error("Failed to create video texture cache: {0}")]
    TextureCacheCreation(BackendError),
    #[error("Failed to create command queue: {0}")]
    CommandQueueCreation(BackendError),
    #[error("Shader function `{0}` not found")]
    ShaderFunctionNotFound(String),
    #[error("Mesh `{0}` not found")]
    MeshNotFound(String),
    #[error("Mesh `{0}` is empty")]
    MeshEmpty(String),
    #[error("Scene has already been initialized")]
    SceneAlreadyInitialized,
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type RendererResult<T> = Result<T, RendererError>;
