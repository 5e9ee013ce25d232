//! ONNX Runtime session construction.
//!
//! Shared by the YOLO detector and the appearance embedding model. Picks an
//! execution provider automatically:
//! - CUDA on Linux with NVIDIA GPU (when the `cuda` feature is enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

/// Load `model_path` into a session, failing with `ModelNotFound` when the
/// file is absent.
pub(crate) fn create_session(model_path: &Path, purpose: &str) -> EngineResult<Session> {
    if !model_path.exists() {
        return Err(EngineError::model_not_found(model_path.display().to_string()));
    }

    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| EngineError::configuration(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| EngineError::configuration(format!("Failed to set optimization level: {e}")))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!(purpose, "Using CUDA execution provider");
                return Ok(session);
            }
        }
        debug!(purpose, "CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!(purpose, "Using CoreML execution provider");
                return Ok(session);
            }
        }
        debug!(purpose, "CoreML execution provider not available, using CPU");
    }

    info!(purpose, model = %model_path.display(), "Using CPU execution provider");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| EngineError::configuration(format!("Failed to load ONNX model: {e}")))
}

/// Convert an RGB image into a normalized NCHW `f32` buffer of shape
/// `[1, 3, h, w]`.
pub(crate) fn to_nchw(rgb: &image::RgbImage) -> (Vec<usize>, Vec<f32>) {
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let mut chw = vec![0.0f32; 3 * h * w];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            chw[c * h * w + i] = pixel[c] as f32 / 255.0;
        }
    }
    (vec![1, 3, h, w], chw)
}
