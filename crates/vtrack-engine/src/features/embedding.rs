//! Learned appearance embedding via ONNX Runtime.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::info;

use super::handcrafted::l2_normalize;
use crate::error::{EngineError, EngineResult};
use crate::onnx;

/// Square input side the embedding model is fed.
pub const EMBEDDING_INPUT_SIZE: u32 = 128;

/// Appearance embedding model.
pub struct EmbeddingModel {
    session: Mutex<Session>,
    output_name: String,
}

impl EmbeddingModel {
    pub fn load(model_path: &str) -> EngineResult<Self> {
        let session = onnx::create_session(Path::new(model_path), "appearance_embedding")?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| EngineError::configuration("Embedding model declares no outputs"))?;
        info!(model_path, output = %output_name, "Appearance embedding model loaded");
        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }

    /// L2-normalized embedding of `crop`.
    pub fn embed(&self, crop: &RgbImage) -> EngineResult<Vec<f32>> {
        let resized = imageops::resize(
            crop,
            EMBEDDING_INPUT_SIZE,
            EMBEDDING_INPUT_SIZE,
            FilterType::Triangle,
        );
        let (shape, data) = onnx::to_nchw(&resized);
        let input: Value = Tensor::from_array((shape, data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| EngineError::detection("embedding", format!("Failed to create tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::detection("embedding", "Session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| EngineError::detection("embedding", format!("ONNX inference failed: {e}")))?;
        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| EngineError::detection("embedding", "Missing embedding output"))?;
        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::detection("embedding", format!("Failed to extract tensor: {e}")))?;

        let mut embedding: Vec<f32> = tensor.1.iter().copied().collect();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Cosine similarity of two vectors. Zero-length vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        dot += x as f64 * y as f64;
        na += x as f64 * x as f64;
        nb += y as f64 * y as f64;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_missing_model_fails_to_load() {
        assert!(matches!(
            EmbeddingModel::load("/nonexistent/embedding.onnx"),
            Err(EngineError::ModelNotFound(_))
        ));
    }
}
