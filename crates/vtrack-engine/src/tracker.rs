//! Instance re-identification.
//!
//! Each frame, candidates are scored against the target by
//! `(1 - w) * appearance + w * position`, where position is continuity with
//! the last accepted center relative to the frame's longer side. The best
//! candidate above the match threshold is accepted. Anything else, including
//! having no target at all, falls back to the most prominent detection
//! (confidence × area). A miss never changes the reference descriptor.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, warn};
use vtrack_models::{Detection, TrackingConfig};

use crate::error::EngineResult;
use crate::features::{Descriptor, FeatureExtractor};
use crate::frame::{self, Frame};

/// The instance a run follows.
///
/// Owned by exactly one processing run.
#[derive(Debug, Clone)]
pub struct TrackedTarget {
    id: String,
    reference: Descriptor,
    center_history: VecDeque<(f64, f64)>,
    capacity: usize,
    frames_since_match: u32,
}

impl TrackedTarget {
    pub fn new(id: impl Into<String>, reference: Descriptor, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            id: id.into(),
            reference,
            center_history: VecDeque::with_capacity(capacity),
            capacity,
            frames_since_match: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn reference_descriptor(&self) -> &Descriptor {
        &self.reference
    }

    /// Recent accepted centers, oldest first.
    pub fn center_history(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.center_history.iter()
    }

    pub fn last_center(&self) -> Option<(f64, f64)> {
        self.center_history.back().copied()
    }

    /// Frames since the last accepted match.
    pub fn frames_since_match(&self) -> u32 {
        self.frames_since_match
    }

    fn record_match(&mut self, center: (f64, f64)) {
        if self.center_history.len() == self.capacity {
            self.center_history.pop_front();
        }
        self.center_history.push_back(center);
        self.frames_since_match = 0;
    }

    fn record_miss(&mut self, reacquire_timeout: u32) {
        self.frames_since_match = self.frames_since_match.saturating_add(1);
        if self.frames_since_match > reacquire_timeout && !self.center_history.is_empty() {
            warn!(
                target_id = %self.id,
                frames = self.frames_since_match,
                "Target lost, dropping position history"
            );
            self.center_history.clear();
        }
    }
}

/// Why a detection was selected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionReason {
    /// Matched the target with this combined score.
    Reidentified { score: f64 },
    /// No acceptable match; the most prominent detection was taken.
    MostProminent,
}

/// The detection chosen for this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub detection: Detection,
    pub reason: SelectionReason,
}

impl Selection {
    pub fn is_reidentified(&self) -> bool {
        matches!(self.reason, SelectionReason::Reidentified { .. })
    }
}

/// Scores candidates against a [`TrackedTarget`].
#[derive(Debug, Clone)]
pub struct InstanceTracker {
    extractor: Arc<FeatureExtractor>,
    config: TrackingConfig,
}

impl InstanceTracker {
    pub fn new(extractor: Arc<FeatureExtractor>, config: TrackingConfig) -> Self {
        Self { extractor, config }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Pick this frame's detection.
    ///
    /// Returns `None` only when `detections` is empty.
    pub fn find_target(
        &self,
        detections: &[Detection],
        frame: &Frame,
        target: Option<&mut TrackedTarget>,
    ) -> EngineResult<Option<Selection>> {
        let Some(target) = target else {
            return Ok(most_prominent(detections));
        };
        if detections.is_empty() {
            target.record_miss(self.config.reacquire_timeout_frames);
            return Ok(None);
        }

        let scale = frame.width().max(frame.height()).max(1) as f64;
        let last_center = target.last_center();
        let w = self.config.position_weight;

        let mut best: Option<(usize, f64)> = None;
        for (index, detection) in detections.iter().enumerate() {
            let appearance = match frame::crop(frame, &detection.bbox) {
                Some(crop) => self
                    .extractor
                    .extract(&crop)?
                    .similarity(target.reference_descriptor())
                    .unwrap_or(0.0),
                None => 0.0,
            };
            let position = match last_center {
                Some((lx, ly)) => {
                    let (cx, cy) = detection.bbox.center();
                    (1.0 - (cx - lx).hypot(cy - ly) / scale).max(0.0)
                }
                None => 1.0,
            };
            let score = (1.0 - w) * appearance + w * position;
            debug!(candidate = index, appearance, position, score, "Scored candidate");

            if best.map_or(true, |(_, s)| score > s) {
                best = Some((index, score));
            }
        }

        match best {
            Some((index, score)) if score > self.config.match_threshold => {
                let detection = detections[index].clone();
                target.record_match(detection.bbox.center());
                Ok(Some(Selection {
                    detection,
                    reason: SelectionReason::Reidentified { score },
                }))
            }
            _ => {
                target.record_miss(self.config.reacquire_timeout_frames);
                Ok(most_prominent(detections))
            }
        }
    }
}

/// Highest confidence × area, first wins on ties.
pub fn most_prominent(detections: &[Detection]) -> Option<Selection> {
    detections
        .iter()
        .fold(None::<&Detection>, |best, d| match best {
            Some(b) if b.prominence() >= d.prominence() => Some(b),
            _ => Some(d),
        })
        .map(|d| Selection {
            detection: d.clone(),
            reason: SelectionReason::MostProminent,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use vtrack_models::BoundingBox;

    fn tracker() -> InstanceTracker {
        InstanceTracker::new(Arc::new(FeatureExtractor::Handcrafted), TrackingConfig::default())
    }

    /// Left half: striped red patch. Right half: flat blue patch.
    fn two_patch_frame() -> Frame {
        Frame::from_fn(200, 100, |x, y| {
            if x < 100 {
                if (y / 4) % 2 == 0 {
                    Rgb([220, 30, 30])
                } else {
                    Rgb([90, 10, 10])
                }
            } else {
                Rgb([20, 40, 200])
            }
        })
    }

    fn target_from(frame: &Frame, bbox: &BoundingBox) -> TrackedTarget {
        let crop = frame::crop(frame, bbox).unwrap();
        let reference = FeatureExtractor::Handcrafted.extract(&crop).unwrap();
        TrackedTarget::new("target", reference, 10)
    }

    #[test]
    fn test_empty_detections_return_none() {
        let frame = two_patch_frame();
        let mut target = target_from(&frame, &BoundingBox::new(10.0, 10.0, 60.0, 60.0));
        assert_eq!(tracker().find_target(&[], &frame, Some(&mut target)).unwrap(), None);
        assert_eq!(tracker().find_target(&[], &frame, None).unwrap(), None);
    }

    #[test]
    fn test_without_target_picks_most_prominent() {
        let frame = two_patch_frame();
        let small_confident = Detection::face(BoundingBox::new(0.0, 0.0, 20.0, 20.0), 0.99);
        let large = Detection::face(BoundingBox::new(100.0, 0.0, 60.0, 60.0), 0.5);

        let selection = tracker()
            .find_target(&[small_confident, large.clone()], &frame, None)
            .unwrap()
            .unwrap();

        assert_eq!(selection.detection, large);
        assert_eq!(selection.reason, SelectionReason::MostProminent);
    }

    #[test]
    fn test_appearance_decides_between_equidistant_candidates() {
        let frame = two_patch_frame();
        let striped = BoundingBox::new(20.0, 20.0, 60.0, 60.0);
        let flat = BoundingBox::new(120.0, 20.0, 60.0, 60.0);
        let mut target = target_from(&frame, &striped);

        let detections = [
            Detection::face(flat, 0.95),
            Detection::face(striped, 0.6),
        ];
        let selection = tracker()
            .find_target(&detections, &frame, Some(&mut target))
            .unwrap()
            .unwrap();

        assert_eq!(selection.detection.bbox, striped);
        assert!(selection.is_reidentified());
        assert_eq!(target.last_center(), Some(striped.center()));
    }

    #[test]
    fn test_history_is_bounded() {
        let frame = two_patch_frame();
        let bbox = BoundingBox::new(20.0, 20.0, 60.0, 60.0);
        let mut target = target_from(&frame, &bbox);
        let tracker = tracker();

        for _ in 0..15 {
            tracker
                .find_target(&[Detection::face(bbox, 0.9)], &frame, Some(&mut target))
                .unwrap();
        }

        assert_eq!(target.center_history().count(), 10);
        assert_eq!(target.frames_since_match(), 0);
    }

    #[test]
    fn test_low_scores_fall_back_and_keep_reference() {
        let frame = two_patch_frame();
        let mut target = target_from(&frame, &BoundingBox::new(20.0, 20.0, 60.0, 60.0));
        let reference = target.reference_descriptor().clone();
        let tracker = InstanceTracker::new(
            Arc::new(FeatureExtractor::Handcrafted),
            TrackingConfig {
                match_threshold: 5.0,
                ..Default::default()
            },
        );

        let detection = Detection::face(BoundingBox::new(20.0, 20.0, 60.0, 60.0), 0.9);
        let selection = tracker
            .find_target(&[detection.clone()], &frame, Some(&mut target))
            .unwrap()
            .unwrap();

        assert_eq!(selection.detection, detection);
        assert_eq!(selection.reason, SelectionReason::MostProminent);
        assert_eq!(target.reference_descriptor(), &reference);
        assert_eq!(target.center_history().count(), 0);
        assert_eq!(target.frames_since_match(), 1);
    }

    #[test]
    fn test_history_cleared_after_reacquire_timeout() {
        let frame = two_patch_frame();
        let bbox = BoundingBox::new(20.0, 20.0, 60.0, 60.0);
        let mut target = target_from(&frame, &bbox);
        let tracker = InstanceTracker::new(
            Arc::new(FeatureExtractor::Handcrafted),
            TrackingConfig {
                reacquire_timeout_frames: 3,
                ..Default::default()
            },
        );

        tracker
            .find_target(&[Detection::face(bbox, 0.9)], &frame, Some(&mut target))
            .unwrap();
        for _ in 0..3 {
            tracker.find_target(&[], &frame, Some(&mut target)).unwrap();
        }
        assert!(target.last_center().is_some());

        tracker.find_target(&[], &frame, Some(&mut target)).unwrap();
        assert!(target.last_center().is_none());
    }
}
