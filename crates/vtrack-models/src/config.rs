//! Engine configuration.
//!
//! Supplied once when an engine is constructed and immutable afterwards.
//! Every threshold the matching and gallery stages use lives here so hosts
//! can tune them without code changes.

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection_type::{DetectionType, FaceStrategy};

/// Invalid configuration value.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be {requirement}, got {value}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: String,
    },

    #[error("target_labels is only supported for objects detection")]
    LabelsWithoutObjects,
}

impl ConfigError {
    fn out_of_range(field: &'static str, requirement: &'static str, value: impl ToString) -> Self {
        Self::OutOfRange {
            field,
            requirement,
            value: value.to_string(),
        }
    }
}

/// What the frame processor does when a detection backend fails mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionErrorPolicy {
    /// Stop the run and report failure.
    #[default]
    Abort,
    /// Treat the frame as having no detections and keep going.
    SkipFrame,
}

/// Re-identification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TrackingConfig {
    /// Weight of positional continuity in the combined score (default: 0.4)
    pub position_weight: f64,
    /// Minimum combined score for a candidate to be accepted (default: 0.3)
    pub match_threshold: f64,
    /// Number of recent target centers kept (default: 10)
    pub history_capacity: usize,
    /// Frames without a re-identification before the center history is
    /// dropped (default: 30)
    pub reacquire_timeout_frames: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            position_weight: 0.4,
            match_threshold: 0.3,
            history_capacity: 10,
            reacquire_timeout_frames: 30,
        }
    }
}

/// Instance gallery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GalleryConfig {
    /// Frames sampled across the video (default: 15)
    pub sample_count: usize,
    /// Crops smaller than this in either dimension are rejected (default: 20)
    pub min_crop_size: u32,
    /// Grayscale correlation above which two crops are duplicates (default: 0.45)
    pub duplicate_threshold: f64,
    /// Fraction of `duplicate_threshold` the combined gray+color score must
    /// exceed to count as a duplicate (default: 0.85)
    pub secondary_ratio: f64,
    /// Worker threads used for per-sample detection (default: 4)
    pub workers: usize,
    /// Sampling interval used when the source cannot report its length
    /// (default: 30 frames)
    pub fallback_interval: u64,
    /// Correlation required when matching a reference image to an entry
    /// (default: 0.6)
    pub reference_match_threshold: f64,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            sample_count: 15,
            min_crop_size: 20,
            duplicate_threshold: 0.45,
            secondary_ratio: 0.85,
            workers: 4,
            fallback_interval: 30,
            reference_match_threshold: 0.6,
        }
    }
}

/// Model file locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ModelPaths {
    /// Haar cascade XML for the classical face detector
    pub face_cascade: String,
    /// YuNet ONNX model for the neural face detector
    pub face_yunet: String,
    /// YOLOv8 ONNX model for object detection
    pub object_yolo: String,
    /// Optional appearance embedding ONNX model; preferred over the
    /// handcrafted descriptor when set
    pub embedding: Option<String>,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            face_cascade: "models/face_detection/haarcascade_frontalface_default.xml".to_string(),
            face_yunet: "models/face_detection/yunet/face_detection_yunet_2023mar.onnx".to_string(),
            object_yolo: "models/object_detection/yolov8n.onnx".to_string(),
            embedding: None,
        }
    }
}

/// Configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    // === Detection ===
    /// Faces or generic objects (default: faces)
    pub detection_type: DetectionType,
    /// Face detector strategy, used when `detection_type` is faces
    pub face_strategy: FaceStrategy,
    /// Labels kept in objects mode; empty keeps every label
    pub target_labels: BTreeSet<String>,
    /// Detections below this confidence are dropped (default: 0.4)
    pub min_confidence: f64,
    /// Detections smaller than this in either dimension are dropped (default: 10px)
    pub min_detection_size: f64,
    /// Scale applied to frames before detection, in (0, 1] (default: 0.75)
    pub detection_downscale: f64,
    /// Re-run detection every N frames (default: 3)
    pub frame_skip: u32,
    /// Behaviour when a backend fails mid-run
    pub detection_error_policy: DetectionErrorPolicy,

    // === Effects ===
    /// Blur strength; even values are raised to the next odd kernel size (default: 51)
    pub blur_strength: u32,
    /// Zoom factor the virtual camera converges to (default: 2.0)
    pub zoom_factor: f64,

    // === Matching ===
    pub tracking: TrackingConfig,
    pub gallery: GalleryConfig,
    pub models: ModelPaths,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detection_type: DetectionType::Faces,
            face_strategy: FaceStrategy::Neural,
            target_labels: BTreeSet::new(),
            min_confidence: 0.4,
            min_detection_size: 10.0,
            detection_downscale: 0.75,
            frame_skip: 3,
            detection_error_policy: DetectionErrorPolicy::Abort,
            blur_strength: 51,
            zoom_factor: 2.0,
            tracking: TrackingConfig::default(),
            gallery: GalleryConfig::default(),
            models: ModelPaths::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration for object detection restricted to `labels`.
    pub fn objects<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            detection_type: DetectionType::Objects,
            target_labels: labels.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Check every numeric parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_labels.is_empty() && self.detection_type != DetectionType::Objects {
            return Err(ConfigError::LabelsWithoutObjects);
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::out_of_range(
                "min_confidence",
                "within [0, 1]",
                self.min_confidence,
            ));
        }
        if self.min_detection_size.is_nan() || self.min_detection_size < 0.0 {
            return Err(ConfigError::out_of_range(
                "min_detection_size",
                "non-negative",
                self.min_detection_size,
            ));
        }
        if !(self.detection_downscale > 0.0 && self.detection_downscale <= 1.0) {
            return Err(ConfigError::out_of_range(
                "detection_downscale",
                "within (0, 1]",
                self.detection_downscale,
            ));
        }
        if self.frame_skip < 1 {
            return Err(ConfigError::out_of_range("frame_skip", "at least 1", self.frame_skip));
        }
        if self.blur_strength < 1 {
            return Err(ConfigError::out_of_range(
                "blur_strength",
                "at least 1",
                self.blur_strength,
            ));
        }
        validate_zoom_factor(self.zoom_factor)?;

        let tracking = &self.tracking;
        if !(0.0..=1.0).contains(&tracking.position_weight) {
            return Err(ConfigError::out_of_range(
                "tracking.position_weight",
                "within [0, 1]",
                tracking.position_weight,
            ));
        }
        if !tracking.match_threshold.is_finite() {
            return Err(ConfigError::out_of_range(
                "tracking.match_threshold",
                "finite",
                tracking.match_threshold,
            ));
        }
        if tracking.history_capacity < 1 {
            return Err(ConfigError::out_of_range(
                "tracking.history_capacity",
                "at least 1",
                tracking.history_capacity,
            ));
        }

        let gallery = &self.gallery;
        if gallery.sample_count < 1 {
            return Err(ConfigError::out_of_range(
                "gallery.sample_count",
                "at least 1",
                gallery.sample_count,
            ));
        }
        if gallery.workers < 1 {
            return Err(ConfigError::out_of_range("gallery.workers", "at least 1", gallery.workers));
        }
        if gallery.fallback_interval < 1 {
            return Err(ConfigError::out_of_range(
                "gallery.fallback_interval",
                "at least 1",
                gallery.fallback_interval,
            ));
        }
        if !(gallery.secondary_ratio > 0.0 && gallery.secondary_ratio <= 1.0) {
            return Err(ConfigError::out_of_range(
                "gallery.secondary_ratio",
                "within (0, 1]",
                gallery.secondary_ratio,
            ));
        }

        Ok(())
    }
}

/// Zoom factors below 1.0 would crop outside the frame.
pub fn validate_zoom_factor(zoom_factor: f64) -> Result<(), ConfigError> {
    if zoom_factor.is_finite() && zoom_factor >= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::out_of_range("zoom_factor", "a finite value >= 1.0", zoom_factor))
    }
}

/// Blur strengths are kernel sizes and must be positive.
pub fn validate_blur_strength(blur_strength: u32) -> Result<(), ConfigError> {
    if blur_strength >= 1 {
        Ok(())
    } else {
        Err(ConfigError::out_of_range("blur_strength", "at least 1", blur_strength))
    }
}
