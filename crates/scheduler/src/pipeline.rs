//! The render pipeline seam.
//!
//! The scheduler drives renders through this trait so the dispatch logic can
//! be exercised without an ffmpeg binary; the production implementation
//! (resolve → estimate → compose → encode) lives in `reelsmith-pipeline`.

use std::sync::Arc;

use async_trait::async_trait;
use reelsmith_db::models::job::Job;

/// Progress sink handed to a pipeline run: `(percent 0..=100, stage)`.
pub type ProgressSink = Arc<dyn Fn(i32, &str) + Send + Sync>;

/// Terminal failure of one pipeline run. The message is stored verbatim as
/// the job's `error_message`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PipelineError(pub String);

/// One full render of one job.
#[async_trait]
pub trait RenderPipeline: Send + Sync {
    /// Render `job` to its output path, reporting progress along the way.
    ///
    /// Long-running; the scheduler invokes it on a spawned task and never
    /// blocks the dispatch loop on it.
    async fn render(&self, job: &Job, on_progress: ProgressSink) -> Result<(), PipelineError>;
}
