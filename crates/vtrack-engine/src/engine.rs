//! Engine facade.
//!
//! Owns the immutable pieces (configuration, detection stage, feature
//! extractor), the current gallery, the designated target and the effect
//! toggles. Every call to [`Engine::run`] builds fresh per-run state, so one
//! engine can drive several runs concurrently.

use std::sync::Arc;

use image::RgbImage;
use tracing::info;
use vtrack_models::{validate_blur_strength, validate_zoom_factor, BlurMode, EngineConfig};

use crate::detection::{create_backend, DetectionBackend, DetectionStage};
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureExtractor;
use crate::frame::{FrameSink, FrameSource};
use crate::gallery::{GalleryBuilder, GalleryEntry};
use crate::processor::{BlurSettings, Effects, FrameProcessor, RunReport};
use crate::tracker::{InstanceTracker, TrackedTarget};

/// Id given to targets built from a caller-supplied image.
pub const REFERENCE_TARGET_ID: &str = "reference";

/// Re-identification and virtual-camera engine.
pub struct Engine {
    config: EngineConfig,
    stage: DetectionStage,
    extractor: Arc<FeatureExtractor>,
    gallery: Vec<GalleryEntry>,
    target: Option<TrackedTarget>,
    effects: Effects,
}

impl Engine {
    /// Validate `config` and construct the detection backend it selects.
    ///
    /// Fails when a parameter is out of range or the selected strategy's
    /// model or native dependency is unavailable.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let backend = create_backend(&config)?;
        Self::with_backend(config, backend)
    }

    /// Construct with a caller-provided backend.
    pub fn with_backend(config: EngineConfig, backend: Arc<dyn DetectionBackend>) -> EngineResult<Self> {
        config.validate()?;
        let extractor = Arc::new(FeatureExtractor::from_config(&config)?);
        let stage = DetectionStage::new(backend, &config);
        info!(
            detection_type = %config.detection_type,
            backend = stage.backend_name(),
            descriptor = ?extractor.kind(),
            "Engine initialized"
        );
        Ok(Self {
            config,
            stage,
            extractor,
            gallery: Vec::new(),
            target: None,
            effects: Effects::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // === Target selection ===

    /// Sample `source` into a catalog of unique instances, replacing any
    /// previous gallery.
    pub fn build_gallery(&mut self, source: &mut dyn FrameSource) -> EngineResult<&[GalleryEntry]> {
        let builder = GalleryBuilder::new(self.stage.clone(), self.config.gallery.clone())?;
        self.gallery = builder.build(source)?;
        Ok(&self.gallery)
    }

    pub fn gallery(&self) -> &[GalleryEntry] {
        &self.gallery
    }

    /// Follow the gallery entry `id`.
    pub fn set_target_from_gallery(&mut self, id: &str) -> EngineResult<()> {
        let entry = self
            .gallery
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| EngineError::TargetNotFound(id.to_string()))?;
        let reference = self.extractor.extract(&entry.representative_crop)?;
        self.target = Some(TrackedTarget::new(
            entry.id.clone(),
            reference,
            self.config.tracking.history_capacity,
        ));
        info!(target_id = id, "Target set from gallery");
        Ok(())
    }

    /// Follow whatever instance best resembles `image`.
    pub fn set_target_from_reference_image(&mut self, image: &RgbImage) -> EngineResult<()> {
        let reference = self.extractor.extract(image)?;
        self.target = Some(TrackedTarget::new(
            REFERENCE_TARGET_ID,
            reference,
            self.config.tracking.history_capacity,
        ));
        info!(width = image.width(), height = image.height(), "Target set from reference image");
        Ok(())
    }

    /// Drop the target; runs follow the most prominent instance.
    pub fn clear_target(&mut self) {
        self.target = None;
    }

    pub fn target(&self) -> Option<&TrackedTarget> {
        self.target.as_ref()
    }

    /// Gallery entry most similar to `image`, if any scores above
    /// `threshold` (the configured reference threshold when `None`).
    pub fn find_gallery_match(&self, image: &RgbImage, threshold: Option<f64>) -> EngineResult<Option<&GalleryEntry>> {
        let threshold = threshold.unwrap_or(self.config.gallery.reference_match_threshold);
        let probe = self.extractor.extract(image)?;

        let mut best: Option<(&GalleryEntry, f64)> = None;
        for entry in &self.gallery {
            let Some(score) = self.extractor.extract(&entry.representative_crop)?.similarity(&probe) else {
                continue;
            };
            if score > threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((entry, score));
            }
        }
        Ok(best.map(|(entry, _)| entry))
    }

    // === Effects ===

    pub fn enable_zoom(&mut self, zoom_factor: f64) -> EngineResult<()> {
        validate_zoom_factor(zoom_factor)?;
        self.effects.zoom_factor = Some(zoom_factor);
        Ok(())
    }

    pub fn disable_zoom(&mut self) {
        self.effects.zoom_factor = None;
    }

    pub fn enable_blur(&mut self, strength: u32, mode: BlurMode) -> EngineResult<()> {
        validate_blur_strength(strength)?;
        self.effects.blur = Some(BlurSettings { strength, mode });
        Ok(())
    }

    pub fn disable_blur(&mut self) {
        self.effects.blur = None;
    }

    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    // === Processing ===

    /// Fresh per-run state: its own camera, its own copy of the target.
    pub fn processor(&self) -> FrameProcessor {
        FrameProcessor::new(
            self.stage.clone(),
            InstanceTracker::new(self.extractor.clone(), self.config.tracking.clone()),
            self.target.clone(),
            self.config.frame_skip,
            self.config.detection_error_policy,
            &self.effects,
        )
    }

    /// Process every frame of `source` into `sink`.
    pub fn run(&self, source: &mut dyn FrameSource, sink: &mut dyn FrameSink) -> RunReport {
        self.processor().run(source, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use vtrack_models::Detection;

    struct NoDetections;

    impl DetectionBackend for NoDetections {
        fn name(&self) -> &'static str {
            "none"
        }

        fn detect(&self, _frame: &Frame) -> EngineResult<Vec<Detection>> {
            Ok(Vec::new())
        }
    }

    fn engine() -> Engine {
        Engine::with_backend(EngineConfig::default(), Arc::new(NoDetections)).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            zoom_factor: -1.0,
            ..Default::default()
        };
        let err = Engine::with_backend(config, Arc::new(NoDetections)).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_effect_toggles_validate() {
        let mut engine = engine();
        assert!(engine.enable_zoom(0.0).unwrap_err().is_configuration());
        assert!(engine.enable_blur(0, BlurMode::OnlyTarget).is_err());

        engine.enable_zoom(2.5).unwrap();
        engine.enable_blur(50, BlurMode::ExcludeTarget).unwrap();
        assert_eq!(engine.effects().zoom_factor, Some(2.5));
        assert_eq!(engine.effects().blur.map(|b| b.mode), Some(BlurMode::ExcludeTarget));

        engine.disable_zoom();
        assert_eq!(engine.effects().zoom_factor, None);
    }

    #[test]
    fn test_unknown_gallery_id() {
        let mut engine = engine();
        assert!(matches!(
            engine.set_target_from_gallery("face_9"),
            Err(EngineError::TargetNotFound(id)) if id == "face_9"
        ));
    }

    #[test]
    fn test_reference_image_target_and_clear() {
        let mut engine = engine();
        engine
            .set_target_from_reference_image(&RgbImage::from_pixel(32, 32, image::Rgb([200, 10, 10])))
            .unwrap();
        assert_eq!(engine.target().map(|t| t.id()), Some(REFERENCE_TARGET_ID));

        engine.clear_target();
        assert!(engine.target().is_none());
    }
}
