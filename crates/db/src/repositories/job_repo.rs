//! Repository for the `jobs` table (PRD-07).
//!
//! Every status literal is the `JobStatus` enum — no magic numbers. Writes
//! that can race with cancellation (complete/fail) guard on
//! `status_id NOT IN (terminal)` so terminal states stay final.

use chrono::Utc;
use reelsmith_core::types::{new_entity_id, EntityId, Timestamp};

use crate::models::job::{Job, JobListQuery, JobRow, QueueStats, SubmitJob};
use crate::models::status::{JobStatus, StatusId, AWAITING_STATUSES, TERMINAL_STATUSES};
use crate::{DbError, DbPool};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, template_id, variables, output_path, status_id, progress, \
    error_message, created_at, started_at, completed_at, \
    estimated_duration_seconds, metadata";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides CRUD operations for render jobs.
pub struct JobRepo;

impl JobRepo {
    /// Persist a new job in `queued` status. Returns the stored row.
    pub async fn submit(pool: &DbPool, input: &SubmitJob) -> Result<Job, DbError> {
        let variables =
            serde_json::to_string(&input.variables).unwrap_or_else(|_| "{}".to_string());
        let metadata = input
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m).unwrap_or_else(|_| "{}".to_string()));

        let query = format!(
            "INSERT INTO jobs \
                 (id, template_id, variables, output_path, status_id, progress, created_at, metadata) \
             VALUES (?, ?, ?, ?, ?, 0, ?, ?) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(new_entity_id())
            .bind(&input.template_id)
            .bind(&variables)
            .bind(&input.output_path)
            .bind(JobStatus::Queued.id())
            .bind(Utc::now())
            .bind(metadata.as_deref())
            .fetch_one(pool)
            .await?;
        row.try_into()
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &DbPool, id: &EntityId) -> Result<Option<Job>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ?");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    /// List jobs newest-created-first, with optional status filter.
    pub async fn list(pool: &DbPool, params: &JobListQuery) -> Result<Vec<Job>, DbError> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let where_clause = match params.status {
            Some(_) => "WHERE status_id = ?",
            None => "",
        };
        let query = format!(
            "SELECT {COLUMNS} FROM jobs {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        );

        let mut q = sqlx::query_as::<_, JobRow>(&query);
        if let Some(status) = params.status {
            q = q.bind(status.id());
        }
        let rows = q.bind(limit).fetch_all(pool).await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    /// The oldest jobs awaiting a slot, FIFO by creation time.
    ///
    /// No claim marker is written here: the dispatch loop is the single
    /// claimer and promotes each job via [`JobRepo::mark_processing`].
    pub async fn next_awaiting(pool: &DbPool, limit: i64) -> Result<Vec<Job>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE status_id IN (?, ?) \
             ORDER BY created_at ASC, id ASC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(AWAITING_STATUSES[0].id())
            .bind(AWAITING_STATUSES[1].id())
            .bind(limit)
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    /// Promote an awaiting job to `processing`, stamping `started_at`.
    ///
    /// Returns `false` if the job is no longer awaiting (e.g. cancelled
    /// between claim and promotion), in which case it must not be rendered.
    pub async fn mark_processing(pool: &DbPool, id: &EntityId) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = ?, started_at = ? \
             WHERE id = ? AND status_id IN (?, ?)",
        )
        .bind(JobStatus::Processing.id())
        .bind(Utc::now())
        .bind(id)
        .bind(AWAITING_STATUSES[0].id())
        .bind(AWAITING_STATUSES[1].id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update progress percentage.
    pub async fn update_progress(pool: &DbPool, id: &EntityId, percent: i32) -> Result<(), DbError> {
        sqlx::query("UPDATE jobs SET progress = ? WHERE id = ?")
            .bind(percent.clamp(0, 100))
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record the advisory render-time estimate.
    pub async fn set_estimate(pool: &DbPool, id: &EntityId, seconds: i64) -> Result<(), DbError> {
        sqlx::query("UPDATE jobs SET estimated_duration_seconds = ? WHERE id = ?")
            .bind(seconds)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Mark a job as completed with `progress = 100`.
    ///
    /// Returns `false` when the job already reached a terminal state (a
    /// cancellation won the race); the caller must not emit a completion
    /// event in that case.
    pub async fn complete(pool: &DbPool, id: &EntityId) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = ?, progress = 100, completed_at = ? \
             WHERE id = ? AND status_id NOT IN (?, ?, ?)",
        )
        .bind(JobStatus::Completed.id())
        .bind(Utc::now())
        .bind(id)
        .bind(TERMINAL_STATUSES[0].id())
        .bind(TERMINAL_STATUSES[1].id())
        .bind(TERMINAL_STATUSES[2].id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a job as failed with its error text. No automatic retry exists;
    /// a failed job is resubmitted as a new job by the caller.
    pub async fn fail(pool: &DbPool, id: &EntityId, error: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = ?, error_message = ?, completed_at = ? \
             WHERE id = ? AND status_id NOT IN (?, ?, ?)",
        )
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .bind(TERMINAL_STATUSES[0].id())
        .bind(TERMINAL_STATUSES[1].id())
        .bind(TERMINAL_STATUSES[2].id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a job unless it is already in a terminal state.
    ///
    /// Returns `true` if the job was cancelled, `false` if it was already
    /// completed, failed, or cancelled.
    pub async fn cancel(pool: &DbPool, id: &EntityId) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = ?, completed_at = ? \
             WHERE id = ? AND status_id NOT IN (?, ?, ?)",
        )
        .bind(JobStatus::Cancelled.id())
        .bind(Utc::now())
        .bind(id)
        .bind(TERMINAL_STATUSES[0].id())
        .bind(TERMINAL_STATUSES[1].id())
        .bind(TERMINAL_STATUSES[2].id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all jobs in a terminal state. Returns the number removed.
    pub async fn clear_finished(pool: &DbPool) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM jobs WHERE status_id IN (?, ?, ?)")
            .bind(TERMINAL_STATUSES[0].id())
            .bind(TERMINAL_STATUSES[1].id())
            .bind(TERMINAL_STATUSES[2].id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count of jobs that are awaiting a slot or currently processing.
    pub async fn active_count(pool: &DbPool) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM jobs WHERE status_id IN (?, ?, ?)",
        )
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Processing.id())
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Aggregate queue statistics.
    ///
    /// Render-time figures are computed only over `completed` jobs that have
    /// both `started_at` and `completed_at`.
    pub async fn stats(pool: &DbPool) -> Result<QueueStats, DbError> {
        let counts = sqlx::query_as::<_, (StatusId, i64)>(
            "SELECT status_id, COUNT(*) FROM jobs GROUP BY status_id",
        )
        .fetch_all(pool)
        .await?;

        let mut total = 0;
        let mut counts_by_status = std::collections::BTreeMap::new();
        for (status_id, count) in counts {
            let status = JobStatus::from_id(status_id).ok_or(DbError::UnknownStatus(status_id))?;
            counts_by_status.insert(status.as_str(), count);
            total += count;
        }

        let spans = sqlx::query_as::<_, (Timestamp, Timestamp)>(
            "SELECT started_at, completed_at FROM jobs \
             WHERE status_id = ? AND started_at IS NOT NULL AND completed_at IS NOT NULL",
        )
        .bind(JobStatus::Completed.id())
        .fetch_all(pool)
        .await?;

        let total_render_time_ms: i64 = spans
            .iter()
            .map(|(started, completed)| (*completed - *started).num_milliseconds())
            .sum();
        let average_render_time_ms = if spans.is_empty() {
            0
        } else {
            total_render_time_ms / spans.len() as i64
        };

        Ok(QueueStats {
            total,
            counts_by_status,
            average_render_time_ms,
            total_render_time_ms,
        })
    }
}
