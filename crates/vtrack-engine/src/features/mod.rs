//! Appearance features.
//!
//! [`FeatureExtractor::extract`] turns a cropped instance into a
//! [`Descriptor`]. Two extractors exist:
//! - handcrafted (texture, gradient and color histograms), always available
//! - a learned embedding, used instead when a model path is configured
//!
//! Descriptors remember which extractor built them and refuse to compare
//! across kinds.

mod embedding;
mod handcrafted;
pub mod histogram;

use std::fmt;

use image::RgbImage;
use vtrack_models::EngineConfig;

use crate::error::{EngineError, EngineResult};

pub use embedding::{cosine_similarity, EmbeddingModel};
pub use handcrafted::DESCRIPTOR_LEN;
pub use histogram::{CropSignature, CropSimilarity};

/// Which extractor built a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Handcrafted,
    Embedding,
}

/// Fixed-length appearance vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    kind: DescriptorKind,
    values: Vec<f32>,
}

impl Descriptor {
    pub fn new(kind: DescriptorKind, values: Vec<f32>) -> Self {
        Self { kind, values }
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Similarity in [-1, 1], or `None` when the descriptors were built by
    /// different extractors.
    ///
    /// Handcrafted descriptors compare by histogram correlation, embeddings
    /// by cosine similarity.
    pub fn similarity(&self, other: &Descriptor) -> Option<f64> {
        if self.kind != other.kind || self.values.len() != other.values.len() {
            return None;
        }
        Some(match self.kind {
            DescriptorKind::Handcrafted => histogram::correlation(&self.values, &other.values),
            DescriptorKind::Embedding => cosine_similarity(&self.values, &other.values),
        })
    }
}

/// Deterministic crop → descriptor mapping.
pub enum FeatureExtractor {
    Handcrafted,
    Embedding(EmbeddingModel),
}

impl FeatureExtractor {
    /// Extractor selected by `config`: the embedding model when configured,
    /// the handcrafted descriptor otherwise.
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        match &config.models.embedding {
            Some(path) => Ok(Self::Embedding(EmbeddingModel::load(path)?)),
            None => Ok(Self::Handcrafted),
        }
    }

    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::Handcrafted => DescriptorKind::Handcrafted,
            Self::Embedding(_) => DescriptorKind::Embedding,
        }
    }

    /// Describe `crop`.
    pub fn extract(&self, crop: &RgbImage) -> EngineResult<Descriptor> {
        if crop.width() == 0 || crop.height() == 0 {
            return Err(EngineError::invalid_image("cannot describe an empty crop"));
        }
        let values = match self {
            Self::Handcrafted => handcrafted::describe(crop),
            Self::Embedding(model) => model.embed(crop)?,
        };
        Ok(Descriptor::new(self.kind(), values))
    }
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handcrafted => write!(f, "FeatureExtractor::Handcrafted"),
            Self::Embedding(_) => write!(f, "FeatureExtractor::Embedding"),
        }
    }
}
