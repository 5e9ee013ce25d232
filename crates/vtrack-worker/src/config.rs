//! Worker configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use vtrack_models::{BlurMode, DetectionType, EngineConfig};

use crate::error::{WorkerError, WorkerResult};

/// What the worker does with its input frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerMode {
    /// Catalog unique instances into `<id>.jpg` crops plus `index.json`.
    Gallery,
    /// Track the target and write processed PNG frames.
    #[default]
    Process,
}

impl WorkerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerMode::Gallery => "gallery",
            WorkerMode::Process => "process",
        }
    }
}

impl fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerMode {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gallery" => Ok(WorkerMode::Gallery),
            "process" => Ok(WorkerMode::Process),
            other => Err(WorkerError::config_error(format!(
                "VTRACK_MODE must be gallery or process, got '{other}'"
            ))),
        }
    }
}

/// How the process run picks its target.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetSource {
    /// Gallery id; the gallery is built from the same input first.
    GalleryId(String),
    /// Image file of the instance to follow.
    ReferenceImage(PathBuf),
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub mode: WorkerMode,
    /// Directory of input frames (PNG/JPEG, processed in file name order)
    pub input_dir: PathBuf,
    /// Output directory for frames or gallery crops
    pub output_dir: PathBuf,
    /// Optional JSON file holding a full `EngineConfig`
    pub engine_config_path: Option<PathBuf>,
    /// Frame rate reported by the image-sequence source
    pub frame_rate: f64,
    pub detection_type: Option<DetectionType>,
    /// Enables the virtual camera when set
    pub zoom_factor: Option<f64>,
    /// Enables region blur when set
    pub blur_mode: Option<BlurMode>,
    pub blur_strength: Option<u32>,
    pub target: Option<TargetSource>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mode: WorkerMode::Process,
            input_dir: PathBuf::from("./frames"),
            output_dir: PathBuf::from("./out"),
            engine_config_path: None,
            frame_rate: 30.0,
            detection_type: None,
            zoom_factor: None,
            blur_mode: None,
            blur_strength: None,
            target: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from `VTRACK_*` environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let target = match (var("VTRACK_TARGET_ID"), var("VTRACK_TARGET_IMAGE")) {
            (Some(_), Some(_)) => {
                return Err(WorkerError::config_error(
                    "set only one of VTRACK_TARGET_ID and VTRACK_TARGET_IMAGE",
                ))
            }
            (Some(id), None) => Some(TargetSource::GalleryId(id)),
            (None, Some(path)) => Some(TargetSource::ReferenceImage(PathBuf::from(path))),
            (None, None) => None,
        };

        Ok(Self {
            mode: var("VTRACK_MODE").map(|v| v.parse::<WorkerMode>()).transpose()?.unwrap_or(defaults.mode),
            input_dir: var("VTRACK_INPUT_DIR").map(PathBuf::from).unwrap_or(defaults.input_dir),
            output_dir: var("VTRACK_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            engine_config_path: var("VTRACK_ENGINE_CONFIG").map(PathBuf::from),
            frame_rate: parse_var(&var, "VTRACK_FPS")?.unwrap_or(defaults.frame_rate),
            detection_type: var("VTRACK_DETECTION_TYPE")
                .map(|v| v.parse::<DetectionType>())
                .transpose()
                .map_err(|e| WorkerError::config_error(e.to_string()))?,
            zoom_factor: parse_var(&var, "VTRACK_ZOOM")?,
            blur_mode: var("VTRACK_BLUR_MODE")
                .map(|v| v.parse::<BlurMode>())
                .transpose()
                .map_err(|e| WorkerError::config_error(e.to_string()))?,
            blur_strength: parse_var(&var, "VTRACK_BLUR_STRENGTH")?,
            target,
        })
    }

    /// Engine configuration: the JSON file when given, else defaults, with
    /// the worker's overrides applied.
    pub fn engine_config(&self) -> WorkerResult<EngineConfig> {
        let mut config = match &self.engine_config_path {
            Some(path) => serde_json::from_str::<EngineConfig>(&std::fs::read_to_string(path)?)?,
            None => EngineConfig::default(),
        };
        if let Some(detection_type) = self.detection_type {
            config.detection_type = detection_type;
        }
        if let Some(zoom) = self.zoom_factor {
            config.zoom_factor = zoom;
        }
        if let Some(strength) = self.blur_strength {
            config.blur_strength = strength;
        }
        Ok(config)
    }
}

fn parse_var<T, F>(var: &F, key: &str) -> WorkerResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| WorkerError::config_error(format!("{key}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> WorkerResult<WorkerConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.mode, WorkerMode::Process);
        assert_eq!(config.frame_rate, 30.0);
        assert!(config.zoom_factor.is_none());
        assert!(config.target.is_none());
    }

    #[test]
    fn test_overrides_parsed() {
        let config = config_from(&[
            ("VTRACK_MODE", "Gallery"),
            ("VTRACK_INPUT_DIR", "/data/in"),
            ("VTRACK_FPS", "24"),
            ("VTRACK_ZOOM", "1.5"),
            ("VTRACK_BLUR_MODE", "exclude_target"),
            ("VTRACK_BLUR_STRENGTH", "35"),
            ("VTRACK_DETECTION_TYPE", "objects"),
            ("VTRACK_TARGET_ID", "person_2"),
        ])
        .unwrap();

        assert_eq!(config.mode, WorkerMode::Gallery);
        assert_eq!(config.input_dir, PathBuf::from("/data/in"));
        assert_eq!(config.frame_rate, 24.0);
        assert_eq!(config.zoom_factor, Some(1.5));
        assert_eq!(config.blur_mode, Some(BlurMode::ExcludeTarget));
        assert_eq!(config.blur_strength, Some(35));
        assert_eq!(config.detection_type, Some(DetectionType::Objects));
        assert_eq!(config.target, Some(TargetSource::GalleryId("person_2".into())));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("VTRACK_MODE", "stream")]).unwrap_err().is_configuration());
        assert!(config_from(&[("VTRACK_ZOOM", "wide")]).is_err());
        assert!(config_from(&[("VTRACK_BLUR_MODE", "everyone")]).is_err());
        assert!(config_from(&[("VTRACK_TARGET_ID", "face_0"), ("VTRACK_TARGET_IMAGE", "a.png")]).is_err());
    }

    #[test]
    fn test_engine_config_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"frame_skip": 3, "zoom_factor": 2.0}"#).unwrap();

        let config = WorkerConfig {
            engine_config_path: Some(path),
            zoom_factor: Some(1.25),
            ..Default::default()
        };
        let engine = config.engine_config().unwrap();

        assert_eq!(engine.frame_skip, 3);
        assert_eq!(engine.zoom_factor, 1.25);
        assert_eq!(engine.tracking, EngineConfig::default().tracking);
    }
}
