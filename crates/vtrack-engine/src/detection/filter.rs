//! Post-detection filtering.

use std::collections::BTreeSet;

use vtrack_models::{Detection, DetectionType, EngineConfig};

/// Rejects low-confidence, tiny and off-vocabulary detections.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionFilter {
    /// Minimum confidence kept.
    pub min_confidence: f64,
    /// Minimum width and height in pixels.
    pub min_size: f64,
    /// Allowed labels; empty allows all.
    pub labels: BTreeSet<String>,
}

impl DetectionFilter {
    pub fn from_config(config: &EngineConfig) -> Self {
        let labels = match config.detection_type {
            DetectionType::Objects => config.target_labels.clone(),
            DetectionType::Faces => BTreeSet::new(),
        };
        Self {
            min_confidence: config.min_confidence,
            min_size: config.min_detection_size,
            labels,
        }
    }

    /// Whether `detection` survives the filter.
    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.confidence >= self.min_confidence
            && detection.bbox.width >= self.min_size
            && detection.bbox.height >= self.min_size
            && (self.labels.is_empty() || self.labels.contains(&detection.label))
    }
}
