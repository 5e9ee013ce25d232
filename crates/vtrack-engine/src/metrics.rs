//! Engine metrics.
//!
//! Recorded through the `metrics` facade; hosts install whatever exporter
//! they use. Nothing is recorded when no recorder is installed.

use std::time::Duration;

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Frames written to the sink.
    pub const FRAMES_PROCESSED_TOTAL: &str = "vtrack_frames_processed_total";

    /// Detection backend invocations by backend.
    pub const DETECTION_RUNS_TOTAL: &str = "vtrack_detection_runs_total";

    /// Detection latency in seconds by backend.
    pub const DETECTION_LATENCY_SECONDS: &str = "vtrack_detection_latency_seconds";

    /// Tracker outcomes (`reidentified`, `fallback`, `none`).
    pub const REIDENTIFICATION_TOTAL: &str = "vtrack_reidentification_total";

    /// Unique entries admitted to a gallery.
    pub const GALLERY_ENTRIES_TOTAL: &str = "vtrack_gallery_entries_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record one frame written to the sink.
pub fn record_frame() {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(1);
}

/// Record one detection backend call.
pub fn record_detection(backend: &'static str, elapsed: Duration) {
    counter!(names::DETECTION_RUNS_TOTAL, "backend" => backend).increment(1);
    histogram!(names::DETECTION_LATENCY_SECONDS, "backend" => backend)
        .record(elapsed.as_secs_f64());
}

/// Record the tracker outcome for one frame.
pub fn record_reidentification(outcome: &'static str) {
    counter!(names::REIDENTIFICATION_TOTAL, "outcome" => outcome).increment(1);
}

/// Record entries admitted by one gallery build.
pub fn record_gallery_entries(count: usize) {
    counter!(names::GALLERY_ENTRIES_TOTAL).increment(count as u64);
}
