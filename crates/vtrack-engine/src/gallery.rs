//! Instance gallery.
//!
//! Samples the video at regular intervals, detects instances in each sample
//! and keeps one representative crop per visually distinct instance.
//!
//! Per-sample detection and signature extraction run on a bounded rayon
//! pool. The accept/reject decision runs on the calling thread, in sample
//! order, against every entry accepted so far: the gallery has exactly one
//! writer, so two near-duplicates can never both get in.

use std::collections::HashMap;

use image::RgbImage;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;
use tracing::{debug, info};
use vtrack_models::{BoundingBox, Detection, GalleryConfig};

use crate::detection::DetectionStage;
use crate::error::{EngineError, EngineResult};
use crate::features::CropSignature;
use crate::frame::{self, Frame, FrameSource};
use crate::metrics;

/// One unique instance found while sampling.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    /// `{label}_{n}`, numbered per label in acceptance order
    pub id: String,
    pub representative_crop: RgbImage,
    pub label: String,
    /// Frame the crop was taken from
    pub frame_index: u64,
    /// Box in that frame
    pub bbox: BoundingBox,
}

/// Serializable summary of an entry, without pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryEntryInfo {
    pub id: String,
    pub label: String,
    pub frame_index: u64,
    pub bbox: BoundingBox,
    pub crop_width: u32,
    pub crop_height: u32,
}

impl GalleryEntry {
    pub fn info(&self) -> GalleryEntryInfo {
        GalleryEntryInfo {
            id: self.id.clone(),
            label: self.label.clone(),
            frame_index: self.frame_index,
            bbox: self.bbox,
            crop_width: self.representative_crop.width(),
            crop_height: self.representative_crop.height(),
        }
    }
}

/// A crop awaiting the dedup decision.
struct Candidate {
    frame_index: u64,
    detection: Detection,
    crop: RgbImage,
    signature: CropSignature,
}

/// Builds galleries with a fixed detection stage and settings.
pub struct GalleryBuilder {
    stage: DetectionStage,
    config: GalleryConfig,
    pool: ThreadPool,
}

impl GalleryBuilder {
    pub fn new(stage: DetectionStage, config: GalleryConfig) -> EngineResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("vtrack-gallery-{i}"))
            .build()
            .map_err(|e| EngineError::internal(format!("Failed to build gallery pool: {e}")))?;
        Ok(Self {
            stage,
            config,
            pool,
        })
    }

    /// Distance between samples for a source of `frame_count` frames.
    ///
    /// Falls back to the configured interval when the length is unknown.
    pub fn sample_interval(&self, frame_count: Option<u64>) -> u64 {
        match frame_count {
            Some(total) => (total / self.config.sample_count.max(1) as u64).max(1),
            None => self.config.fallback_interval.max(1),
        }
    }

    /// Sample `source` and return its unique instances.
    pub fn build(&self, source: &mut dyn FrameSource) -> EngineResult<Vec<GalleryEntry>> {
        let frame_count = source.frame_count();
        let interval = self.sample_interval(frame_count);
        let max_samples = frame_count.map(|_| self.config.sample_count);
        info!(
            interval,
            frame_count = ?frame_count,
            workers = self.config.workers,
            "Building instance gallery"
        );

        let mut entries: Vec<GalleryEntry> = Vec::new();
        let mut accepted: Vec<CropSignature> = Vec::new();
        let mut label_counts: HashMap<String, usize> = HashMap::new();
        let mut batch: Vec<(u64, Frame)> = Vec::with_capacity(self.config.workers);
        let mut sampled = 0usize;
        let mut index = 0u64;

        loop {
            let frame = source.next_frame().map_err(|e| e.at_frame(index))?;
            let done = match frame {
                Some(frame) => {
                    if index % interval == 0 && max_samples.map_or(true, |max| sampled < max) {
                        batch.push((index, frame));
                        sampled += 1;
                    }
                    index += 1;
                    max_samples.is_some_and(|max| sampled >= max)
                }
                None => true,
            };

            if batch.len() >= self.config.workers.max(1) || (done && !batch.is_empty()) {
                let candidates = self.process_batch(&batch)?;
                batch.clear();
                for candidate in candidates {
                    self.admit(candidate, &mut accepted, &mut entries, &mut label_counts);
                }
            }
            if done {
                break;
            }
        }

        metrics::record_gallery_entries(entries.len());
        info!(samples = sampled, entries = entries.len(), "Gallery built");
        Ok(entries)
    }

    /// Detect and describe every sample in parallel; results keep sample order.
    fn process_batch(&self, batch: &[(u64, Frame)]) -> EngineResult<Vec<Candidate>> {
        let per_sample: Vec<EngineResult<Vec<Candidate>>> = self.pool.install(|| {
            batch
                .par_iter()
                .map(|(index, frame)| self.candidates_for(*index, frame))
                .collect()
        });
        let mut candidates = Vec::new();
        for result in per_sample {
            candidates.extend(result?);
        }
        Ok(candidates)
    }

    fn candidates_for(&self, frame_index: u64, frame: &Frame) -> EngineResult<Vec<Candidate>> {
        let detections = self.stage.detect(frame).map_err(|e| e.at_frame(frame_index))?;
        let min = self.config.min_crop_size;
        Ok(detections
            .into_iter()
            .filter_map(|detection| {
                let crop = frame::crop(frame, &detection.bbox)?;
                if crop.width() < min || crop.height() < min {
                    return None;
                }
                let signature = CropSignature::from_crop(&crop);
                Some(Candidate {
                    frame_index,
                    detection,
                    crop,
                    signature,
                })
            })
            .collect())
    }

    fn admit(
        &self,
        candidate: Candidate,
        accepted: &mut Vec<CropSignature>,
        entries: &mut Vec<GalleryEntry>,
        label_counts: &mut HashMap<String, usize>,
    ) {
        let duplicate = accepted.iter().any(|existing| {
            candidate
                .signature
                .compare(existing)
                .is_duplicate(self.config.duplicate_threshold, self.config.secondary_ratio)
        });
        if duplicate {
            debug!(frame = candidate.frame_index, label = %candidate.detection.label, "Duplicate crop rejected");
            return;
        }

        let n = label_counts.entry(candidate.detection.label.clone()).or_insert(0);
        let id = format!("{}_{}", candidate.detection.label, n);
        *n += 1;
        debug!(frame = candidate.frame_index, id = %id, "Gallery entry accepted");

        accepted.push(candidate.signature);
        entries.push(GalleryEntry {
            id,
            representative_crop: candidate.crop,
            label: candidate.detection.label,
            frame_index: candidate.frame_index,
            bbox: candidate.detection.bbox,
        });
    }
}
