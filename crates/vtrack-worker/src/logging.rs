//! Tracing setup and structured job logging.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use crate::config::WorkerMode;

/// Install the global subscriber: colored output for dev, JSON when
/// `LOG_FORMAT=json`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["vtrack=info", "ort=warn", "onnxruntime=warn"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logs one worker job's lifecycle with its id and mode attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    mode: WorkerMode,
}

impl JobLogger {
    /// Logger for a new job with a fresh id.
    pub fn new(mode: WorkerMode) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            mode,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, mode = %self.mode, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, mode = %self.mode, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, mode = %self.mode, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, mode = %self.mode, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, mode = %self.mode, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn mode(&self) -> WorkerMode {
        self.mode
    }

    /// Span carrying the job id; engine run spans nest under it.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, mode = %self.mode)
    }
}
