//! Per-frame detection results.

use crate::bbox::BoundingBox;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A candidate instance found in one frame.
///
/// Produced fresh by every detection call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Bounding box in full-frame pixel coordinates
    pub bbox: BoundingBox,
    /// Class label ("face", "person", "car", ...)
    pub label: String,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f64,
}

impl Detection {
    /// Create a new detection.
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }

    /// Create a face detection.
    pub fn face(bbox: BoundingBox, confidence: f64) -> Self {
        Self::new(bbox, "face", confidence)
    }

    /// Prominence used when no identity match is available: confidence × area.
    #[inline]
    pub fn prominence(&self) -> f64 {
        self.confidence * self.bbox.area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prominence() {
        let det = Detection::face(BoundingBox::new(0.0, 0.0, 10.0, 20.0), 0.5);
        assert!((det.prominence() - 100.0).abs() < 1e-9);
        assert_eq!(det.label, "face");
    }
}
