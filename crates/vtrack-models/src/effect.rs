//! Region effect modes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::detection_type::ParseDetectionTypeError;

/// Which detected regions receive the blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlurMode {
    /// Blur only the tracked target; every other region is untouched.
    OnlyTarget,

    /// Blur every detected region except the tracked target.
    #[default]
    ExcludeTarget,
}

impl BlurMode {
    /// Returns the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlurMode::OnlyTarget => "only_target",
            BlurMode::ExcludeTarget => "exclude_target",
        }
    }
}

impl fmt::Display for BlurMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BlurMode {
    type Err = ParseDetectionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "only_target" => Ok(BlurMode::OnlyTarget),
            "exclude_target" => Ok(BlurMode::ExcludeTarget),
            other => Err(ParseDetectionTypeError::new(
                other,
                "only_target, exclude_target",
            )),
        }
    }
}
