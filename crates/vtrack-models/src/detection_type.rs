//! Detection type definitions.
//!
//! This module defines what the engine looks for and how:
//!
//! - `Faces`: face detection, using either the classical cascade or the
//!   neural YuNet detector (`FaceStrategy`)
//! - `Objects`: YOLOv8 detection over the COCO vocabulary, optionally
//!   restricted to a set of target labels

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What kind of instance the engine detects and tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    /// Human faces.
    #[default]
    Faces,

    /// Generic objects from a fixed label vocabulary.
    Objects,
}

impl DetectionType {
    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionType::Faces => "faces",
            DetectionType::Objects => "objects",
        }
    }
}

impl fmt::Display for DetectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown detection type or strategy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown value '{value}', expected one of: {expected}")]
pub struct ParseDetectionTypeError {
    value: String,
    expected: &'static str,
}

impl ParseDetectionTypeError {
    pub(crate) fn new(value: impl Into<String>, expected: &'static str) -> Self {
        Self {
            value: value.into(),
            expected,
        }
    }
}

impl FromStr for DetectionType {
    type Err = ParseDetectionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "faces" | "face" => Ok(DetectionType::Faces),
            "objects" | "object" => Ok(DetectionType::Objects),
            _ => Err(ParseDetectionTypeError::new(s, "faces, objects")),
        }
    }
}

/// Face detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum FaceStrategy {
    /// Classical Haar cascade (fast, no confidence scores).
    Cascade,

    /// YuNet CNN detector.
    #[default]
    Neural,
}

impl FaceStrategy {
    /// Returns the strategy name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceStrategy::Cascade => "cascade",
            FaceStrategy::Neural => "neural",
        }
    }
}

impl fmt::Display for FaceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FaceStrategy {
    type Err = ParseDetectionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cascade" | "haar" => Ok(FaceStrategy::Cascade),
            "neural" | "yunet" => Ok(FaceStrategy::Neural),
            _ => Err(ParseDetectionTypeError::new(s, "cascade, neural")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_type_from_str() {
        assert_eq!("faces".parse::<DetectionType>().unwrap(), DetectionType::Faces);
        assert_eq!(" Objects ".parse::<DetectionType>().unwrap(), DetectionType::Objects);
        assert!("people".parse::<DetectionType>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&DetectionType::Objects).unwrap();
        assert_eq!(json, "\"objects\"");
        let strategy: FaceStrategy = serde_json::from_str("\"cascade\"").unwrap();
        assert_eq!(strategy, FaceStrategy::Cascade);
    }

    #[test]
    fn test_display_roundtrip() {
        for strategy in [FaceStrategy::Cascade, FaceStrategy::Neural] {
            assert_eq!(strategy.to_string().parse::<FaceStrategy>().unwrap(), strategy);
        }
    }
}
