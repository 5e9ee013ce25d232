//! One worker job: gallery export or a full processing run.

use std::path::PathBuf;

use uuid::Uuid;
use vtrack_engine::{Engine, GalleryEntry, GalleryEntryInfo};

use crate::config::{TargetSource, WorkerConfig, WorkerMode};
use crate::error::{WorkerError, WorkerResult};
use crate::io::{export_gallery, ImageSequenceSource, PngSequenceSink};
use crate::logging::JobLogger;

/// What a finished job produced.
#[derive(Debug)]
pub enum JobOutcome {
    Gallery {
        entries: Vec<GalleryEntryInfo>,
        index_path: PathBuf,
    },
    Processed {
        run_id: Uuid,
        frames: u64,
        reidentified_frames: u64,
        fallback_frames: u64,
    },
}

/// Runs a single job against one engine.
pub struct JobRunner {
    config: WorkerConfig,
    engine: Engine,
}

impl JobRunner {
    /// Build the engine from the worker's engine configuration.
    pub fn new(config: WorkerConfig) -> WorkerResult<Self> {
        let engine = Engine::new(config.engine_config()?)?;
        Ok(Self::with_engine(config, engine))
    }

    pub fn with_engine(config: WorkerConfig, engine: Engine) -> Self {
        Self { config, engine }
    }

    /// Run on the blocking pool; the engine loop is synchronous.
    pub async fn run(self) -> WorkerResult<JobOutcome> {
        tokio::task::spawn_blocking(move || self.execute())
            .await
            .map_err(|e| WorkerError::task_failed(e.to_string()))?
    }

    /// Run on the calling thread.
    pub fn execute(mut self) -> WorkerResult<JobOutcome> {
        let logger = JobLogger::new(self.config.mode);
        let span = logger.create_span();
        let _guard = span.enter();
        logger.log_start(&format!("input {}", self.config.input_dir.display()));

        let result = match self.config.mode {
            WorkerMode::Gallery => self.gallery(&logger),
            WorkerMode::Process => self.process(&logger),
        };
        match &result {
            Ok(JobOutcome::Gallery { entries, .. }) => {
                logger.log_completion(&format!("{} gallery entries", entries.len()))
            }
            Ok(JobOutcome::Processed { frames, .. }) => {
                logger.log_completion(&format!("{frames} frames written"))
            }
            Err(e) => logger.log_error(&e.to_string()),
        }
        result
    }

    fn open_source(&self) -> WorkerResult<ImageSequenceSource> {
        ImageSequenceSource::open(&self.config.input_dir, self.config.frame_rate)
    }

    fn gallery(&mut self, logger: &JobLogger) -> WorkerResult<JobOutcome> {
        let mut source = self.open_source()?;
        let entries = self.engine.build_gallery(&mut source)?;
        logger.log_progress(&format!("{} unique instances found", entries.len()));

        let index_path = export_gallery(entries, &self.config.output_dir)?;
        Ok(JobOutcome::Gallery {
            entries: entries.iter().map(GalleryEntry::info).collect(),
            index_path,
        })
    }

    fn process(&mut self, logger: &JobLogger) -> WorkerResult<JobOutcome> {
        match self.config.target.clone() {
            Some(TargetSource::ReferenceImage(path)) => {
                let reference = image::open(&path)?.to_rgb8();
                self.engine.set_target_from_reference_image(&reference)?;
                if let Some(entry) = self.engine.find_gallery_match(&reference, None)? {
                    logger.log_progress(&format!("reference resembles gallery entry {}", entry.id));
                }
            }
            Some(TargetSource::GalleryId(id)) => {
                let mut source = self.open_source()?;
                let count = self.engine.build_gallery(&mut source)?.len();
                logger.log_progress(&format!("gallery built with {count} entries"));
                self.engine.set_target_from_gallery(&id)?;
            }
            None => logger.log_warning("no target set, following the most prominent instance"),
        }

        if let Some(zoom) = self.config.zoom_factor {
            self.engine.enable_zoom(zoom)?;
        }
        if let Some(mode) = self.config.blur_mode {
            let strength = self
                .config
                .blur_strength
                .unwrap_or(self.engine.config().blur_strength);
            self.engine.enable_blur(strength, mode)?;
        }
        let effects = self.engine.effects();
        if effects.zoom_factor.is_none() && effects.blur.is_none() {
            logger.log_warning("no effect enabled, frames pass through unchanged");
        }

        let mut source = self.open_source()?;
        let mut sink = PngSequenceSink::create(&self.config.output_dir)?;
        let report = self.engine.run(&mut source, &mut sink).into_result()?;

        Ok(JobOutcome::Processed {
            run_id: report.run_id,
            frames: report.frames_processed,
            reidentified_frames: report.reidentified_frames,
            fallback_frames: report.fallback_frames,
        })
    }
}
