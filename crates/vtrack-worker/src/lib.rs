//! Image-sequence host for the VTrack engine.
//!
//! This crate provides:
//! - Environment-driven worker configuration
//! - A directory-of-images frame source and PNG frame sink
//! - Gallery export (`<id>.jpg` crops plus `index.json`)
//! - Tracing setup and per-job structured logging

pub mod config;
pub mod error;
pub mod io;
pub mod job;
pub mod logging;

pub use config::{TargetSource, WorkerConfig, WorkerMode};
pub use error::{WorkerError, WorkerResult};
pub use io::{export_gallery, ImageSequenceSource, PngSequenceSink};
pub use job::{JobOutcome, JobRunner};
pub use logging::{init_tracing, JobLogger};
