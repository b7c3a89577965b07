//! Job entity models and DTOs for the batch render queue (PRD-07).

use std::collections::BTreeMap;

use reelsmith_core::types::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::JobStatus;
use crate::error::DbError;

/// A render job in domain form, decoded from its row.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: EntityId,
    pub template_id: EntityId,
    pub variables: serde_json::Map<String, serde_json::Value>,
    pub output_path: String,
    pub status: JobStatus,
    /// Completion percentage, 0..=100.
    pub progress: i32,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub estimated_duration_seconds: Option<i64>,
    /// Free-form caller metadata, stored opaquely. May carry a `priority`
    /// hint; dispatch order does not consult it.
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// DTO for submitting a new render job.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJob {
    pub template_id: EntityId,
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
    pub output_path: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Query parameters for job listing.
#[derive(Debug, Clone, Default)]
pub struct JobListQuery {
    /// Filter by lifecycle status.
    pub status: Option<JobStatus>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
}

/// Aggregate statistics over the whole jobs table.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total: i64,
    /// Row count per status label (only statuses that occur).
    pub counts_by_status: BTreeMap<&'static str, i64>,
    /// Mean wall-clock render time over completed jobs that have both
    /// `started_at` and `completed_at`. Zero when no such job exists.
    pub average_render_time_ms: i64,
    pub total_render_time_ms: i64,
}

/// A raw `jobs` row. JSON columns stay TEXT until decoded by [`TryFrom`].
#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: String,
    pub template_id: String,
    pub variables: String,
    pub output_path: String,
    pub status_id: i16,
    pub progress: i32,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub estimated_duration_seconds: Option<i64>,
    pub metadata: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = JobStatus::from_id(row.status_id).ok_or(DbError::UnknownStatus(row.status_id))?;
        let variables = serde_json::from_str(&row.variables).map_err(|source| DbError::Decode {
            table: "jobs",
            column: "variables",
            id: row.id.clone(),
            source,
        })?;
        let metadata = match &row.metadata {
            Some(raw) => Some(serde_json::from_str(raw).map_err(|source| DbError::Decode {
                table: "jobs",
                column: "metadata",
                id: row.id.clone(),
                source,
            })?),
            None => None,
        };

        Ok(Job {
            id: row.id,
            template_id: row.template_id,
            variables,
            output_path: row.output_path,
            status,
            progress: row.progress,
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            estimated_duration_seconds: row.estimated_duration_seconds,
            metadata,
        })
    }
}
