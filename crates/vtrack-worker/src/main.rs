//! VTrack worker binary.

use anyhow::Context;
use tracing::info;

use vtrack_worker::{init_tracing, JobOutcome, JobRunner, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();
    info!("Starting vtrack-worker");

    let config = WorkerConfig::from_env().context("Failed to load worker config")?;
    info!("Worker config: {:?}", config);

    let runner = JobRunner::new(config).context("Failed to create engine")?;
    match runner.run().await.context("Job failed")? {
        JobOutcome::Gallery { entries, index_path } => {
            info!(entries = entries.len(), index = %index_path.display(), "Gallery ready");
        }
        JobOutcome::Processed {
            run_id,
            frames,
            reidentified_frames,
            fallback_frames,
        } => {
            info!(%run_id, frames, reidentified_frames, fallback_frames, "Processing finished");
        }
    }

    info!("Worker shutdown complete");
    Ok(())
}
