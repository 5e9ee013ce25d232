//! Per-run frame loop.
//!
//! ```text
//! Init -> { ReadFrame -> (Detect | ReuseCached) -> Track -> Render -> WriteFrame }* -> Drain -> Done
//!                                                                                   \-> Failed
//! ```
//!
//! Frames are handled strictly in order on the calling thread: the camera
//! and tracker state for frame n+1 depend on frame n. Detection runs on
//! every `frame_skip`-th frame; frames in between reuse the cached result,
//! on the assumption that instances move little within the skip window.
//! The tracker and camera still run on every frame.

use std::fmt;

use tracing::{debug, info, info_span, warn};
use uuid::Uuid;
use vtrack_models::{BlurMode, Detection, DetectionErrorPolicy};

use crate::camera::{CameraState, VirtualCamera};
use crate::detection::DetectionStage;
use crate::effects::{apply_blur, RegionBlur};
use crate::error::{EngineError, EngineResult};
use crate::frame::{Frame, FrameSink, FrameSource};
use crate::metrics;
use crate::tracker::{InstanceTracker, Selection, TrackedTarget};

/// Effects applied during a run. Both are optional and combinable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    /// Virtual camera zoom factor
    pub zoom_factor: Option<f64>,
    /// Region blur
    pub blur: Option<BlurSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurSettings {
    pub strength: u32,
    pub mode: BlurMode,
}

/// Terminal state of a run.
#[derive(Debug)]
pub enum RunStatus {
    Completed,
    /// Output written so far may not be playable.
    Failed(EngineError),
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Outcome of one processing run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Frames written to the sink
    pub frames_processed: u64,
    /// Frames on which the detection backend actually ran
    pub detection_runs: u64,
    /// Frames whose selection was a re-identified target
    pub reidentified_frames: u64,
    /// Frames that fell back to the most prominent instance
    pub fallback_frames: u64,
    /// Camera state after the last frame, when zoom was enabled
    pub final_camera: Option<CameraState>,
    pub status: RunStatus,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }

    /// The report on success, the run's error otherwise.
    pub fn into_result(self) -> EngineResult<RunReport> {
        match self.status {
            RunStatus::Completed => Ok(self),
            RunStatus::Failed(e) => Err(e),
        }
    }
}

/// Detections from the last frame that ran the backend.
#[derive(Debug, Default)]
struct DetectionCache {
    detections: Vec<Detection>,
    refreshed_at: Option<u64>,
}

/// State owned by a single run. Never shared between runs.
pub struct FrameProcessor {
    run_id: Uuid,
    stage: DetectionStage,
    tracker: InstanceTracker,
    target: Option<TrackedTarget>,
    frame_skip: u64,
    error_policy: DetectionErrorPolicy,
    zoom_factor: Option<f64>,
    blur: Option<(RegionBlur, BlurMode)>,
    cache: DetectionCache,
    report: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    frames_processed: u64,
    detection_runs: u64,
    reidentified_frames: u64,
    fallback_frames: u64,
}

impl FrameProcessor {
    pub fn new(
        stage: DetectionStage,
        tracker: InstanceTracker,
        target: Option<TrackedTarget>,
        frame_skip: u32,
        error_policy: DetectionErrorPolicy,
        effects: &Effects,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stage,
            tracker,
            target,
            frame_skip: frame_skip.max(1) as u64,
            error_policy,
            zoom_factor: effects.zoom_factor,
            blur: effects.blur.map(|b| (RegionBlur::new(b.strength), b.mode)),
            cache: DetectionCache::default(),
            report: Counters::default(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Drive `source` to completion, writing every output frame to `sink`.
    pub fn run(mut self, source: &mut dyn FrameSource, sink: &mut dyn FrameSink) -> RunReport {
        let span = info_span!("run", run_id = %self.run_id);
        let _guard = span.enter();

        let (width, height) = source.dimensions();
        info!(
            width,
            height,
            fps = source.frame_rate(),
            backend = self.stage.backend_name(),
            target_id = self.target.as_ref().map(|t| t.id()),
            zoom = ?self.zoom_factor,
            blur = ?self.blur.as_ref().map(|(b, m)| (b.size(), *m)),
            "Processing started"
        );

        let mut camera = self.zoom_factor.map(|z| VirtualCamera::new(width, height, z));
        let status = match self.frame_loop(source, sink, &mut camera, (width, height)) {
            Ok(()) => {
                info!(frames = self.report.frames_processed, "Processing completed");
                RunStatus::Completed
            }
            Err(e) => {
                warn!(frames = self.report.frames_processed, error = %e, "Processing failed");
                RunStatus::Failed(e)
            }
        };

        RunReport {
            run_id: self.run_id,
            frames_processed: self.report.frames_processed,
            detection_runs: self.report.detection_runs,
            reidentified_frames: self.report.reidentified_frames,
            fallback_frames: self.report.fallback_frames,
            final_camera: camera.as_ref().map(|c| *c.state()),
            status,
        }
    }

    fn frame_loop(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        camera: &mut Option<VirtualCamera>,
        dimensions: (u32, u32),
    ) -> EngineResult<()> {
        let mut index = 0u64;
        loop {
            let Some(frame) = source.next_frame().map_err(|e| read_error(e, index))? else {
                sink.finish().map_err(|e| write_error(e, index))?;
                return Ok(());
            };
            if frame.dimensions() != dimensions {
                return Err(EngineError::frame_read(
                    index,
                    format!("frame size {:?} differs from stream size {:?}", frame.dimensions(), dimensions),
                ));
            }

            let output = self.process_frame(index, frame, camera)?;
            sink.write_frame(&output).map_err(|e| write_error(e, index))?;
            self.report.frames_processed += 1;
            metrics::record_frame();
            index += 1;
        }
    }

    fn process_frame(
        &mut self,
        index: u64,
        mut frame: Frame,
        camera: &mut Option<VirtualCamera>,
    ) -> EngineResult<Frame> {
        if index % self.frame_skip == 0 {
            self.refresh_detections(index, &frame)?;
        }

        let selection = self
            .tracker
            .find_target(&self.cache.detections, &frame, self.target.as_mut())
            .map_err(|e| e.at_frame(index))?;
        self.count_selection(index, selection.as_ref());
        let selected = selection.map(|s| s.detection);

        if let Some((blur, mode)) = &self.blur {
            apply_blur(&mut frame, &self.cache.detections, *mode, selected.as_ref(), blur);
        }
        if let Some(camera) = camera.as_mut() {
            let rect = camera.advance(selected.as_ref().map(|d| &d.bbox));
            frame = camera.render(&frame, &rect);
        }
        Ok(frame)
    }

    fn refresh_detections(&mut self, index: u64, frame: &Frame) -> EngineResult<()> {
        self.report.detection_runs += 1;
        match self.stage.detect(frame) {
            Ok(detections) => {
                debug!(frame = index, count = detections.len(), "Detections refreshed");
                self.cache.detections = detections;
            }
            Err(e) => {
                let e = e.at_frame(index);
                match self.error_policy {
                    DetectionErrorPolicy::Abort => return Err(e),
                    DetectionErrorPolicy::SkipFrame => {
                        warn!(frame = index, error = %e, "Detection failed, continuing without detections");
                        self.cache.detections.clear();
                    }
                }
            }
        }
        self.cache.refreshed_at = Some(index);
        Ok(())
    }

    fn count_selection(&mut self, index: u64, selection: Option<&Selection>) {
        let outcome = match selection {
            Some(s) if s.is_reidentified() => {
                self.report.reidentified_frames += 1;
                "reidentified"
            }
            Some(_) => {
                self.report.fallback_frames += 1;
                "fallback"
            }
            None => "none",
        };
        debug!(
            frame = index,
            outcome,
            cached_from = ?self.cache.refreshed_at,
            "Target selection"
        );
        metrics::record_reidentification(outcome);
    }
}

/// Source failures always surface as read errors for the current frame.
fn read_error(e: EngineError, index: u64) -> EngineError {
    match e {
        EngineError::FrameRead { .. } => e.at_frame(index),
        other => EngineError::frame_read(index, other.to_string()),
    }
}

/// Sink failures always surface as write errors for the current frame.
fn write_error(e: EngineError, index: u64) -> EngineError {
    match e {
        EngineError::FrameWrite { .. } => e.at_frame(index),
        other => EngineError::frame_write(index, other.to_string()),
    }
}
