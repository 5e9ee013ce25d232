//! Error types for engine operations.

use thiserror::Error;
use vtrack_models::ConfigError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while building or running the engine.
///
/// There is no "no match" variant: the tracker falls back to the most
/// prominent instance instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Frame read failed at frame {frame_index}: {message}")]
    FrameRead { frame_index: u64, message: String },

    #[error("Detection failed in {component} at frame {frame_index}: {message}")]
    Detection {
        frame_index: u64,
        component: String,
        message: String,
    },

    #[error("Frame write failed at frame {frame_index}: {message}")]
    FrameWrite { frame_index: u64, message: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Unknown gallery entry: {0}")]
    TargetNotFound(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a detection error raised by `component`.
    ///
    /// Backends don't know which frame they are looking at; the frame
    /// processor stamps the index with [`EngineError::at_frame`].
    pub fn detection(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Detection {
            frame_index: 0,
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a frame read error.
    pub fn frame_read(frame_index: u64, message: impl Into<String>) -> Self {
        Self::FrameRead {
            frame_index,
            message: message.into(),
        }
    }

    /// Create a frame write error.
    pub fn frame_write(frame_index: u64, message: impl Into<String>) -> Self {
        Self::FrameWrite {
            frame_index,
            message: message.into(),
        }
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create an invalid image error.
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Attach a frame index to frame-scoped errors.
    pub fn at_frame(self, index: u64) -> Self {
        match self {
            Self::Detection {
                component, message, ..
            } => Self::Detection {
                frame_index: index,
                component,
                message,
            },
            Self::FrameRead { message, .. } => Self::FrameRead {
                frame_index: index,
                message,
            },
            Self::FrameWrite { message, .. } => Self::FrameWrite {
                frame_index: index,
                message,
            },
            other => other,
        }
    }

    /// Errors raised while constructing the engine are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::ModelNotFound(_))
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
