//! YuNet CNN face detector via OpenCV's `FaceDetectorYN`.
//!
//! The detector's input size must match the frame it sees. Frames in one
//! run share a size, so the size is only reset when it changes.

use vtrack_models::Detection;

use super::DetectionBackend;
use crate::error::EngineResult;
use crate::frame::Frame;

#[cfg(feature = "opencv")]
mod imp {
    use std::path::Path;
    use std::sync::Mutex;

    use opencv::core::{Mat, Ptr, Size};
    use opencv::dnn::{DNN_BACKEND_DEFAULT, DNN_TARGET_CPU};
    use opencv::objdetect::FaceDetectorYN;
    use opencv::prelude::*;
    use tracing::{debug, info};
    use vtrack_models::{BoundingBox, Detection};

    use crate::detection::frame_to_bgr_mat;
    use crate::error::{EngineError, EngineResult};
    use crate::frame::Frame;

    const SCORE_THRESHOLD: f32 = 0.6;
    const NMS_THRESHOLD: f32 = 0.3;
    const TOP_K: i32 = 5000;
    /// Columns per face row: box (4), five landmarks (10), score.
    const ROW_LEN: i32 = 15;

    struct State {
        detector: Ptr<FaceDetectorYN>,
        input_size: (i32, i32),
    }

    pub struct YuNetFaceBackend {
        state: Mutex<State>,
    }

    impl YuNetFaceBackend {
        pub fn new(model_path: &str) -> EngineResult<Self> {
            if !Path::new(model_path).exists() {
                return Err(EngineError::model_not_found(model_path));
            }
            let input_size = (320, 320);
            let detector = FaceDetectorYN::create(
                model_path,
                "",
                Size::new(input_size.0, input_size.1),
                SCORE_THRESHOLD,
                NMS_THRESHOLD,
                TOP_K,
                DNN_BACKEND_DEFAULT,
                DNN_TARGET_CPU,
            )
            .map_err(|e| EngineError::configuration(format!("Failed to create YuNet detector: {e}")))?;
            info!(model_path, "YuNet face detector initialized");
            Ok(Self {
                state: Mutex::new(State {
                    detector,
                    input_size,
                }),
            })
        }

        pub fn detect(&self, frame: &Frame) -> EngineResult<Vec<Detection>> {
            let fail = |e: opencv::Error| EngineError::detection("yunet", e.to_string());

            let bgr = frame_to_bgr_mat(frame).map_err(fail)?;
            let size = (frame.width() as i32, frame.height() as i32);

            let mut state = self
                .state
                .lock()
                .map_err(|_| EngineError::detection("yunet", "Detector lock poisoned"))?;
            if state.input_size != size {
                state
                    .detector
                    .set_input_size(Size::new(size.0, size.1))
                    .map_err(fail)?;
                state.input_size = size;
                debug!(width = size.0, height = size.1, "YuNet input size updated");
            }

            let mut faces = Mat::default();
            state.detector.detect(&bgr, &mut faces).map_err(fail)?;

            if faces.rows() <= 0 {
                return Ok(Vec::new());
            }
            if faces.cols() < ROW_LEN {
                return Err(EngineError::detection(
                    "yunet",
                    format!("unexpected output width {} (expected {ROW_LEN})", faces.cols()),
                ));
            }

            let mut detections = Vec::with_capacity(faces.rows() as usize);
            for row in 0..faces.rows() {
                let at = |col: i32| faces.at_2d::<f32>(row, col).map(|v| *v as f64).map_err(fail);
                let bbox = BoundingBox::new(at(0)?, at(1)?, at(2)?, at(3)?);
                detections.push(Detection::face(bbox, at(ROW_LEN - 1)?));
            }
            Ok(detections)
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
    pub struct YuNetFaceBackend {
        _private: (),
    }

    impl YuNetFaceBackend {
        pub fn new(_model_path: &str) -> EngineResult<Self> {
            Err(opencv_unavailable(DetectorKind::YuNet))
        }

        pub fn detect(&self, _frame: &Frame) -> EngineResult<Vec<Detection>> {
            Err(opencv_unavailable(DetectorKind::YuNet))
        }
    }
}

pub use imp::YuNetFaceBackend;

impl DetectionBackend for YuNetFaceBackend {
    fn name(&self) -> &'static str {
        "yunet"
    }

    fn detect(&self, frame: &Frame) -> EngineResult<Vec<Detection>> {
        YuNetFaceBackend::detect(self, frame)
    }
}
