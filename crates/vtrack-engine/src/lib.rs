//! Instance re-identification and virtual-camera tracking engine.
//!
//! Given decoded frames and a target to follow or obscure, the engine:
//! - detects candidate faces or objects in each frame
//! - re-identifies which candidate is the target, blending appearance and
//!   positional continuity, falling back to the most prominent instance
//! - drives a smoothed pan/zoom virtual camera and/or selective region blur
//!
//! An optional gallery pass samples a video into a catalog of unique
//! instances a caller can pick the target from.
//!
//! ```text
//! Gallery (optional) -> target selection -> per frame:
//!     DetectionStage -> InstanceTracker -> VirtualCamera / region blur -> sink
//! ```

pub mod camera;
pub mod detection;
pub mod effects;
pub mod engine;
pub mod error;
pub mod features;
pub mod frame;
pub mod gallery;
pub mod metrics;
mod onnx;
pub mod processor;
pub mod tracker;

pub use camera::{CameraState, CropRect, VirtualCamera};
pub use detection::{create_backend, DetectionBackend, DetectionStage, DetectorKind};
pub use effects::{apply_blur, kernel_size, RegionBlur};
pub use engine::{Engine, REFERENCE_TARGET_ID};
pub use error::{EngineError, EngineResult};
pub use features::{Descriptor, DescriptorKind, FeatureExtractor};
pub use frame::{Frame, FrameSink, FrameSource, VecFrameSink, VecFrameSource};
pub use gallery::{GalleryBuilder, GalleryEntry, GalleryEntryInfo};
pub use processor::{BlurSettings, Effects, FrameProcessor, RunReport, RunStatus};
pub use tracker::{InstanceTracker, Selection, SelectionReason, TrackedTarget};

pub use vtrack_models as models;
