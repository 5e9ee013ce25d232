//! Haar cascade face detector.
//!
//! Fast classical detector. It reports no scores, so every face it finds is
//! given confidence 1.0.

use vtrack_models::Detection;

use super::DetectionBackend;
use crate::error::EngineResult;
use crate::frame::Frame;

#[cfg(feature = "opencv")]
mod imp {
    use std::path::Path;
    use std::sync::Mutex;

    use opencv::core::{Mat, Rect, Size, Vector};
    use opencv::imgproc;
    use opencv::objdetect::CascadeClassifier;
    use opencv::prelude::*;
    use tracing::info;
    use vtrack_models::{BoundingBox, Detection};

    use crate::detection::frame_to_bgr_mat;
    use crate::error::{EngineError, EngineResult};
    use crate::frame::Frame;

    const SCALE_FACTOR: f64 = 1.1;
    const MIN_NEIGHBORS: i32 = 5;
    const MIN_FACE: i32 = 30;

    pub struct CascadeFaceBackend {
        classifier: Mutex<CascadeClassifier>,
    }

    impl CascadeFaceBackend {
        pub fn new(model_path: &str) -> EngineResult<Self> {
            if !Path::new(model_path).exists() {
                return Err(EngineError::model_not_found(model_path));
            }
            let classifier = CascadeClassifier::new(model_path).map_err(|e| {
                EngineError::configuration(format!("Failed to load Haar cascade: {e}"))
            })?;
            if classifier.empty().unwrap_or(true) {
                return Err(EngineError::configuration(format!(
                    "Haar cascade at {model_path} is empty"
                )));
            }
            info!(model_path, "Haar cascade face detector initialized");
            Ok(Self {
                classifier: Mutex::new(classifier),
            })
        }

        pub fn detect(&self, frame: &Frame) -> EngineResult<Vec<Detection>> {
            let fail = |e: opencv::Error| EngineError::detection("haar_cascade", e.to_string());

            let bgr = frame_to_bgr_mat(frame).map_err(fail)?;
            let mut gray = Mat::default();
            imgproc::cvt_color_def(&bgr, &mut gray, imgproc::COLOR_BGR2GRAY).map_err(fail)?;

            let mut faces = Vector::<Rect>::new();
            let mut classifier = self
                .classifier
                .lock()
                .map_err(|_| EngineError::detection("haar_cascade", "Classifier lock poisoned"))?;
            classifier
                .detect_multi_scale(
                    &gray,
                    &mut faces,
                    SCALE_FACTOR,
                    MIN_NEIGHBORS,
                    0,
                    Size::new(MIN_FACE, MIN_FACE),
                    Size::default(),
                )
                .map_err(fail)?;

            Ok(faces
                .iter()
                .map(|r| {
                    Detection::face(
                        BoundingBox::new(r.x as f64, r.y as f64, r.width as f64, r.height as f64),
                        1.0,
                    )
                })
                .collect())
        }
    }
}

#[cfg(not(feature = "opencv"))]
mod imp {
    use vtrack_models::Detection;

    use crate::detection::{opencv_unavailable, DetectorKind};
    use crate::error::EngineResult;
    use crate::frame::Frame;

    /// Placeholder that refuses construction when OpenCV is not compiled in.
    pub struct CascadeFaceBackend {
        _private: (),
    }

    impl CascadeFaceBackend {
        pub fn new(_model_path: &str) -> EngineResult<Self> {
            Err(opencv_unavailable(DetectorKind::HaarCascade))
        }

        pub fn detect(&self, _frame: &Frame) -> EngineResult<Vec<Detection>> {
            Err(opencv_unavailable(DetectorKind::HaarCascade))
        }
    }
}

pub use imp::CascadeFaceBackend;

impl DetectionBackend for CascadeFaceBackend {
    fn name(&self) -> &'static str {
        "haar_cascade"
    }

    fn detect(&self, frame: &Frame) -> EngineResult<Vec<Detection>> {
        CascadeFaceBackend::detect(self, frame)
    }
}
