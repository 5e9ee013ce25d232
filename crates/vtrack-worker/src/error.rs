//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;
use vtrack_engine::EngineError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No PNG or JPEG frames in {0}")]
    EmptyInput(PathBuf),

    #[error("Worker task failed: {0}")]
    TaskFailed(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }

    /// Bad settings rather than bad input or a runtime failure.
    pub fn is_configuration(&self) -> bool {
        match self {
            WorkerError::ConfigError(_) => true,
            WorkerError::Engine(e) => e.is_configuration(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(WorkerError::config_error("bad mode").is_configuration());
        assert!(WorkerError::from(EngineError::configuration("zoom")).is_configuration());
        assert!(!WorkerError::EmptyInput(PathBuf::from("/in")).is_configuration());
    }
}
