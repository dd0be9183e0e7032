//! Model registry error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelRegistryError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("out of memory: needed {needed} bytes, {available} available")]
    OutOfMemory { needed: usize, available: usize },

    #[error("model '{0}' is already being loaded by another caller")]
    AlreadyLoading(String),

    #[error("failed to load model '{0}': {1}")]
    LoadFailed(String, String),

    #[error("invalid registry configuration: {0}")]
    InvalidConfig(String),

    #[error("registry is full (max_models reached)")]
    RegistryFull,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
