//! Shared data models for the VTrack engine.
//!
//! This crate provides Serde-serializable types for:
//! - Bounding boxes and per-frame detections
//! - Detection types and strategies
//! - Region effect modes
//! - Engine configuration and its validation

pub mod bbox;
pub mod config;
pub mod detection;
pub mod detection_type;
pub mod effect;

// Re-export common types
pub use bbox::BoundingBox;
pub use config::{
    validate_blur_strength, validate_zoom_factor, ConfigError, DetectionErrorPolicy,
    EngineConfig, GalleryConfig, ModelPaths, TrackingConfig,
};
pub use detection::Detection;
pub use detection_type::{DetectionType, FaceStrategy, ParseDetectionTypeError};
pub use effect::BlurMode;
