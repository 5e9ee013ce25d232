//! Detection backends.
//!
//! Every strategy implements [`DetectionBackend`]. The strategy is chosen
//! once from [`EngineConfig`] by [`create_backend`]; if its model or native
//! dependency is missing, construction fails with a configuration error
//! instead of quietly picking a different detector.
//!
//! [`DetectionStage`] wraps a backend with the pre- and post-processing the
//! rest of the engine relies on:
//! - optional downscaling before detection, with boxes mapped back to
//!   full-frame pixel space
//! - clipping to the frame
//! - confidence, size and label filtering

mod cascade;
mod filter;
mod yolo;
mod yunet;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use image::imageops::{self, FilterType};
use tracing::{debug, info};
use vtrack_models::{Detection, DetectionType, EngineConfig, FaceStrategy};

use crate::error::EngineResult;
use crate::frame::Frame;
use crate::metrics;

pub use cascade::CascadeFaceBackend;
pub use filter::DetectionFilter;
pub use yolo::{YoloBackend, YoloConfig, COCO_CLASSES};
pub use yunet::YuNetFaceBackend;

/// A strategy that finds candidate instances in one frame.
///
/// Implementations return boxes in the pixel space of the frame they were
/// given. Backends are shared between gallery workers, so any mutable
/// inference state lives behind a lock.
pub trait DetectionBackend: Send + Sync {
    /// Short name used in logs, metrics and error context.
    fn name(&self) -> &'static str;

    /// Detect instances in `frame`.
    fn detect(&self, frame: &Frame) -> EngineResult<Vec<Detection>>;
}

/// The closed set of detection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    /// Haar cascade face detector.
    HaarCascade,
    /// YuNet CNN face detector.
    YuNet,
    /// YOLOv8 object detector.
    Yolo,
}

impl DetectorKind {
    /// Strategy selected by `config`.
    pub fn for_config(config: &EngineConfig) -> Self {
        match (config.detection_type, config.face_strategy) {
            (DetectionType::Objects, _) => DetectorKind::Yolo,
            (DetectionType::Faces, FaceStrategy::Cascade) => DetectorKind::HaarCascade,
            (DetectionType::Faces, FaceStrategy::Neural) => DetectorKind::YuNet,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::HaarCascade => "haar_cascade",
            DetectorKind::YuNet => "yunet",
            DetectorKind::Yolo => "yolo",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the backend selected by `config`.
pub fn create_backend(config: &EngineConfig) -> EngineResult<Arc<dyn DetectionBackend>> {
    let kind = DetectorKind::for_config(config);
    info!(detector = %kind, "Creating detection backend");

    let backend: Arc<dyn DetectionBackend> = match kind {
        DetectorKind::HaarCascade => Arc::new(CascadeFaceBackend::new(&config.models.face_cascade)?),
        DetectorKind::YuNet => Arc::new(YuNetFaceBackend::new(&config.models.face_yunet)?),
        DetectorKind::Yolo => Arc::new(YoloBackend::new(YoloConfig {
            model_path: config.models.object_yolo.clone(),
            ..Default::default()
        })?),
    };
    Ok(backend)
}

/// Backend plus the shared pre/post-processing.
#[derive(Clone)]
pub struct DetectionStage {
    backend: Arc<dyn DetectionBackend>,
    filter: DetectionFilter,
    downscale: f64,
}

impl DetectionStage {
    pub fn new(backend: Arc<dyn DetectionBackend>, config: &EngineConfig) -> Self {
        Self {
            backend,
            filter: DetectionFilter::from_config(config),
            downscale: config.detection_downscale,
        }
    }

    /// Name of the wrapped backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Detect, returning boxes in full-frame pixel space that pass the filter.
    pub fn detect(&self, frame: &Frame) -> EngineResult<Vec<Detection>> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let raw = if self.downscale < 1.0 {
            let small_w = ((width as f64 * self.downscale).round() as u32).max(1);
            let small_h = ((height as f64 * self.downscale).round() as u32).max(1);
            let small = imageops::resize(frame, small_w, small_h, FilterType::Triangle);
            let back = 1.0 / self.downscale;
            self.backend
                .detect(&small)?
                .into_iter()
                .map(|d| Detection {
                    bbox: d.bbox.scale(back),
                    ..d
                })
                .collect()
        } else {
            self.backend.detect(frame)?
        };
        metrics::record_detection(self.backend.name(), started.elapsed());

        let raw_count = raw.len();
        let detections: Vec<Detection> = raw
            .into_iter()
            .filter_map(|d| {
                let bbox = d.bbox.clip_to_frame(width, height)?;
                Some(Detection { bbox, ..d })
            })
            .filter(|d| self.filter.accepts(d))
            .collect();

        debug!(
            backend = self.backend.name(),
            raw = raw_count,
            kept = detections.len(),
            "Detection completed"
        );
        Ok(detections)
    }
}

impl fmt::Debug for DetectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionStage")
            .field("backend", &self.backend.name())
            .field("filter", &self.filter)
            .field("downscale", &self.downscale)
            .finish()
    }
}

/// Copy an RGB frame into a BGR OpenCV matrix.
#[cfg(feature = "opencv")]
pub(crate) fn frame_to_bgr_mat(frame: &Frame) -> opencv::Result<opencv::core::Mat> {
    use opencv::core::{Mat, Scalar, CV_8UC3};
    use opencv::prelude::*;

    let (width, height) = frame.dimensions();
    let mut mat =
        Mat::new_rows_cols_with_default(height as i32, width as i32, CV_8UC3, Scalar::all(0.0))?;
    let data = mat.data_bytes_mut()?;
    for (dst, src) in data.chunks_exact_mut(3).zip(frame.as_raw().chunks_exact(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }
    Ok(mat)
}

/// Configuration error for a strategy whose native dependency is absent.
#[cfg(not(feature = "opencv"))]
pub(crate) fn opencv_unavailable(kind: DetectorKind) -> crate::error::EngineError {
    crate::error::EngineError::configuration(format!(
        "{kind} face detection requires the `opencv` feature, which this build does not include"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::sync::Mutex;
    use vtrack_models::BoundingBox;

    // Lets the tests `unwrap_err()` on `create_backend` results.
    impl fmt::Debug for dyn DetectionBackend {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("DetectionBackend").field("name", &self.name()).finish()
        }
    }

    /// Records the size of every frame it sees and returns fixed boxes.
    struct FixedBackend {
        boxes: Vec<Detection>,
        seen: Mutex<Vec<(u32, u32)>>,
    }

    impl DetectionBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(&self, frame: &Frame) -> EngineResult<Vec<Detection>> {
            self.seen.lock().unwrap().push(frame.dimensions());
            Ok(self.boxes.clone())
        }
    }

    fn stage(boxes: Vec<Detection>, config: &EngineConfig) -> (DetectionStage, Arc<FixedBackend>) {
        let backend = Arc::new(FixedBackend {
            boxes,
            seen: Mutex::new(Vec::new()),
        });
        (DetectionStage::new(backend.clone(), config), backend)
    }

    #[test]
    fn test_kind_selection() {
        let mut config = EngineConfig::default();
        assert_eq!(DetectorKind::for_config(&config), DetectorKind::YuNet);
        config.face_strategy = FaceStrategy::Cascade;
        assert_eq!(DetectorKind::for_config(&config), DetectorKind::HaarCascade);
        config.detection_type = DetectionType::Objects;
        assert_eq!(DetectorKind::for_config(&config), DetectorKind::Yolo);
    }

    #[test]
    fn test_downscaled_boxes_map_back_to_full_frame() {
        let config = EngineConfig::default();
        let (stage, backend) = stage(
            vec![Detection::face(BoundingBox::new(30.0, 15.0, 75.0, 45.0), 0.9)],
            &config,
        );
        let frame = Frame::new(400, 200);

        let detections = stage.detect(&frame).unwrap();

        assert_eq!(backend.seen.lock().unwrap().as_slice(), &[(300, 150)]);
        assert_eq!(detections.len(), 1);
        let bbox = detections[0].bbox;
        assert!((bbox.x - 40.0).abs() < 1e-9);
        assert!((bbox.y - 20.0).abs() < 1e-9);
        assert!((bbox.width - 100.0).abs() < 1e-9);
        assert!((bbox.height - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_downscale_passes_original_frame() {
        let config = EngineConfig {
            detection_downscale: 1.0,
            ..Default::default()
        };
        let (stage, backend) = stage(Vec::new(), &config);
        stage.detect(&Frame::new(64, 48)).unwrap();
        assert_eq!(backend.seen.lock().unwrap().as_slice(), &[(64, 48)]);
    }

    #[test]
    fn test_confidence_floor_holds_for_every_result() {
        let config = EngineConfig {
            detection_downscale: 1.0,
            ..Default::default()
        };
        let boxes = (0..10)
            .map(|i| Detection::face(BoundingBox::new(i as f64 * 20.0, 10.0, 15.0, 15.0), i as f64 / 10.0))
            .collect();
        let (stage, _) = stage(boxes, &config);

        let detections = stage.detect(&Frame::new(300, 100)).unwrap();

        assert_eq!(detections.len(), 6);
        assert!(detections.iter().all(|d| d.confidence >= config.min_confidence));
    }

    #[test]
    fn test_boxes_are_clipped_to_frame() {
        let config = EngineConfig {
            detection_downscale: 1.0,
            ..Default::default()
        };
        let (stage, _) = stage(
            vec![
                Detection::face(BoundingBox::new(-20.0, -20.0, 60.0, 60.0), 0.9),
                Detection::face(BoundingBox::new(500.0, 0.0, 60.0, 60.0), 0.9),
            ],
            &config,
        );

        let detections = stage.detect(&Frame::new(100, 100)).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, BoundingBox::new(0.0, 0.0, 40.0, 40.0));
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_face_backends_fail_fast_without_opencv() {
        let err = create_backend(&EngineConfig::default()).unwrap_err();
        assert!(err.is_configuration(), "unexpected error: {err}");

        let config = EngineConfig {
            face_strategy: FaceStrategy::Cascade,
            ..Default::default()
        };
        assert!(create_backend(&config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_missing_yolo_model_fails_fast() {
        let mut config = EngineConfig::objects(["person"]);
        config.models.object_yolo = "/nonexistent/yolov8n.onnx".to_string();
        let err = create_backend(&config).unwrap_err();
        assert!(matches!(err, EngineError::ModelNotFound(_)));
    }
}
