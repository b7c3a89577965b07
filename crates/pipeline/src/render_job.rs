//! The production render pipeline for one job (PRD-09).
//!
//! resolve → estimate → compose → encode. The scheduler owns status
//! transitions and event emission; this type only does the work and reports
//! progress through the sink it was handed.

use async_trait::async_trait;
use reelsmith_db::models::job::Job;
use reelsmith_db::repositories::{JobRepo, TemplateRepo};
use reelsmith_db::DbPool;
use reelsmith_ffmpeg::compose::{build_graph, OutputOptions};
use reelsmith_ffmpeg::encode::FfmpegRenderer;
use reelsmith_ffmpeg::estimate::estimate_render_time;
use reelsmith_scheduler::{PipelineError, ProgressSink, RenderPipeline};

use crate::error::ServiceError;

/// Renders jobs by driving the ffmpeg bridge end to end.
#[derive(Clone)]
pub struct CompositorPipeline {
    pool: DbPool,
    renderer: FfmpegRenderer,
}

impl CompositorPipeline {
    pub fn new(pool: DbPool, renderer: FfmpegRenderer) -> Self {
        Self { pool, renderer }
    }

    async fn run(&self, job: &Job, on_progress: ProgressSink) -> Result<(), ServiceError> {
        let template = TemplateRepo::find_by_id(&self.pool, &job.template_id)
            .await?
            .ok_or_else(|| ServiceError::TemplateNotFound(job.template_id.clone()))?;

        let resolved = reelsmith_core::substitution::resolve(&template, &job.variables)?;

        let estimate = estimate_render_time(&resolved);
        tracing::info!(
            job_id = %job.id,
            complexity = estimate.complexity.label(),
            estimated_seconds = estimate.estimated_seconds,
            "Render estimated",
        );
        JobRepo::set_estimate(&self.pool, &job.id, estimate.estimated_seconds).await?;

        let graph = build_graph(&resolved)?;
        let options = OutputOptions::from_template(&resolved);
        self.renderer
            .render(&graph, &options, &job.output_path, &on_progress)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RenderPipeline for CompositorPipeline {
    async fn render(&self, job: &Job, on_progress: ProgressSink) -> Result<(), PipelineError> {
        // Flatten to the stored error text; the taxonomy survives in the
        // message itself (validation vs graph-build vs engine exit).
        self.run(job, on_progress)
            .await
            .map_err(|e| PipelineError(e.to_string()))
    }
}
