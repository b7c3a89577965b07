//! Batch render scheduler and dispatch loop (PRD-07).
//!
//! A single dispatch task is the only writer of the queued→processing
//! transition, so the concurrency ceiling is plain slot arithmetic over the
//! in-memory running set — no semaphore. The task wakes immediately on
//! submission and on job completion, with a periodic safety-net tick.
//!
//! Cancellation is cooperative: a cancelled `queued` job is never
//! dispatched, but an already-spawned engine process is not killed — its
//! terminal write is discarded by the repository's terminal-status guard.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reelsmith_core::types::EntityId;
use reelsmith_core::validation::validate_variables;
use reelsmith_db::models::job::{Job, JobListQuery, QueueStats, SubmitJob};
use reelsmith_db::repositories::{JobRepo, TemplateRepo};
use reelsmith_db::{DbError, DbPool};
use reelsmith_events::{EventBus, RenderEvent};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::pipeline::{ProgressSink, RenderPipeline};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("template not found: {0}")]
    TemplateNotFound(EntityId),

    /// The variable set does not satisfy the template schema. Raised before
    /// a job record is created.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Accepts job submissions and drives a bounded set of concurrent renders.
///
/// Cheap to clone; all state is shared behind an `Arc`.
#[derive(Clone)]
pub struct BatchScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    pool: DbPool,
    bus: Arc<EventBus>,
    pipeline: Arc<dyn RenderPipeline>,
    max_concurrent: usize,
    dispatch_interval: std::time::Duration,
    /// Ids of jobs currently in `processing`.
    running: Mutex<HashSet<EntityId>>,
    wake: Notify,
    cancel: CancellationToken,
    loop_started: AtomicBool,
}

impl BatchScheduler {
    pub fn new(
        pool: DbPool,
        bus: Arc<EventBus>,
        pipeline: Arc<dyn RenderPipeline>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                pool,
                bus,
                pipeline,
                max_concurrent: config.max_concurrent.max(1),
                dispatch_interval: config.dispatch_interval(),
                running: Mutex::new(HashSet::new()),
                wake: Notify::new(),
                cancel: CancellationToken::new(),
                loop_started: AtomicBool::new(false),
            }),
        }
    }

    /// Validate against the template schema, persist a `queued` job, wake
    /// the dispatch loop, and return immediately — submission never waits
    /// on render completion.
    pub async fn submit(&self, input: SubmitJob) -> Result<Job, SchedulerError> {
        let template = TemplateRepo::find_by_id(&self.inner.pool, &input.template_id)
            .await?
            .ok_or_else(|| SchedulerError::TemplateNotFound(input.template_id.clone()))?;

        let report = validate_variables(&template, &input.variables);
        if !report.is_valid() {
            return Err(SchedulerError::Validation(report.summary()));
        }

        let job = JobRepo::submit(&self.inner.pool, &input).await?;
        tracing::info!(job_id = %job.id, template_id = %job.template_id, "Job queued");
        self.inner.bus.publish(RenderEvent::JobQueued { job: job.clone() });

        self.start();
        self.inner.wake.notify_one();
        Ok(job)
    }

    /// Sequential application of [`submit`](Self::submit). Not transactional:
    /// an error leaves earlier submissions in place.
    pub async fn submit_many(&self, inputs: Vec<SubmitJob>) -> Result<Vec<Job>, SchedulerError> {
        let mut jobs = Vec::with_capacity(inputs.len());
        for input in inputs {
            jobs.push(self.submit(input).await?);
        }
        Ok(jobs)
    }

    pub async fn get(&self, id: &EntityId) -> Result<Option<Job>, SchedulerError> {
        Ok(JobRepo::find_by_id(&self.inner.pool, id).await?)
    }

    pub async fn list(&self, query: &JobListQuery) -> Result<Vec<Job>, SchedulerError> {
        Ok(JobRepo::list(&self.inner.pool, query).await?)
    }

    /// Cancel a job. Returns `false` for jobs already in a terminal state.
    ///
    /// A `queued` job will never be dispatched afterwards. A `processing`
    /// job frees its slot immediately, but the external render process is
    /// not terminated; its eventual result is discarded.
    pub async fn cancel(&self, id: &EntityId) -> Result<bool, SchedulerError> {
        let cancelled = JobRepo::cancel(&self.inner.pool, id).await?;
        if cancelled {
            self.inner.running.lock().await.remove(id);
            tracing::info!(job_id = %id, "Job cancelled");
            self.inner.wake.notify_one();
        }
        Ok(cancelled)
    }

    /// Delete all completed/failed/cancelled jobs. Returns the count removed.
    pub async fn clear_finished(&self) -> Result<u64, SchedulerError> {
        Ok(JobRepo::clear_finished(&self.inner.pool).await?)
    }

    pub async fn stats(&self) -> Result<QueueStats, SchedulerError> {
        Ok(JobRepo::stats(&self.inner.pool).await?)
    }

    /// Start the dispatch loop. Idempotent: starting an already-running
    /// loop is a no-op, and no duplicate tickers are ever spawned.
    pub fn start(&self) {
        if self.inner.loop_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_loop().await;
        });
    }

    /// Stop the dispatch loop. In-flight renders finish on their own.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }
}

impl SchedulerInner {
    async fn run_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.dispatch_interval);
        tracing::info!(
            max_concurrent = self.max_concurrent,
            interval_ms = self.dispatch_interval.as_millis() as u64,
            "Batch scheduler started",
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Batch scheduler shutting down");
                    break;
                }
                _ = self.wake.notified() => {}
                _ = ticker.tick() => {}
            }

            // A single job's failure must never take the loop down.
            if let Err(e) = Arc::clone(&self).dispatch_cycle().await {
                tracing::error!(error = %e, "Dispatch cycle failed");
            }
        }
    }

    /// One dispatch cycle: fill free slots with the oldest awaiting jobs.
    async fn dispatch_cycle(self: Arc<Self>) -> Result<(), SchedulerError> {
        let available = {
            let running = self.running.lock().await;
            self.max_concurrent.saturating_sub(running.len())
        };
        if available == 0 {
            return Ok(());
        }

        let claimable = JobRepo::next_awaiting(&self.pool, available as i64).await?;
        for job in claimable {
            // Refuses jobs cancelled between the claim query and promotion.
            if !JobRepo::mark_processing(&self.pool, &job.id).await? {
                continue;
            }
            let Some(job) = JobRepo::find_by_id(&self.pool, &job.id).await? else {
                continue;
            };

            self.running.lock().await.insert(job.id.clone());
            tracing::info!(job_id = %job.id, template_id = %job.template_id, "Job started");
            self.bus.publish(RenderEvent::JobStarted { job: job.clone() });

            let inner = Arc::clone(&self);
            tokio::spawn(async move {
                inner.run_job(job).await;
            });
        }
        Ok(())
    }

    /// Drive one job through the pipeline and record its terminal state.
    async fn run_job(self: Arc<Self>, job: Job) {
        // Progress updates funnel through a channel so database writes and
        // event emission keep the pipeline's reporting order.
        let (tx, mut rx) = mpsc::unbounded_channel::<(i32, String)>();
        let progress_writer = {
            let inner = Arc::clone(&self);
            let job_id = job.id.clone();
            tokio::spawn(async move {
                while let Some((percent, stage)) = rx.recv().await {
                    if let Err(e) = JobRepo::update_progress(&inner.pool, &job_id, percent).await {
                        tracing::error!(job_id = %job_id, error = %e, "Failed to update job progress");
                    }
                    inner.bus.publish(RenderEvent::JobProgress {
                        job_id: job_id.clone(),
                        percent,
                        stage,
                    });
                }
            })
        };
        let sink: ProgressSink = Arc::new(move |percent, stage| {
            let _ = tx.send((percent, stage.to_string()));
        });

        let outcome = self.pipeline.render(&job, Arc::clone(&sink)).await;

        // Close the channel and let queued progress drain before terminal
        // status is recorded.
        drop(sink);
        let _ = progress_writer.await;

        match outcome {
            Ok(()) => match JobRepo::complete(&self.pool, &job.id).await {
                Ok(true) => {
                    tracing::info!(job_id = %job.id, "Job completed");
                    self.publish_terminal(&job.id, None).await;
                }
                Ok(false) => {
                    tracing::info!(job_id = %job.id, "Render finished after cancellation; result discarded");
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to mark job completed");
                }
            },
            Err(e) => {
                let message = e.to_string();
                match JobRepo::fail(&self.pool, &job.id, &message).await {
                    Ok(true) => {
                        tracing::warn!(job_id = %job.id, error = %message, "Job failed");
                        self.publish_terminal(&job.id, Some(message)).await;
                    }
                    Ok(false) => {
                        tracing::info!(job_id = %job.id, "Render failed after cancellation; result discarded");
                    }
                    Err(db_err) => {
                        tracing::error!(job_id = %job.id, error = %db_err, "Failed to mark job failed");
                    }
                }
            }
        }

        self.running.lock().await.remove(&job.id);
        self.wake.notify_one();

        match JobRepo::active_count(&self.pool).await {
            Ok(0) => self.bus.publish(RenderEvent::QueueEmpty),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Failed to check for an empty queue"),
        }
    }

    /// Emit the completion/failure event with the freshly stored row.
    async fn publish_terminal(&self, id: &EntityId, error: Option<String>) {
        match JobRepo::find_by_id(&self.pool, id).await {
            Ok(Some(job)) => {
                let event = match error {
                    None => RenderEvent::JobCompleted { job },
                    Some(error) => RenderEvent::JobFailed { job, error },
                };
                self.bus.publish(event);
            }
            Ok(None) => {}
            Err(e) => tracing::error!(job_id = %id, error = %e, "Failed to load job for event"),
        }
    }
}
