//! Job status enum mapping to the INTEGER `status_id` column.
//!
//! Discriminants are stable and ordered by lifecycle position; rows written
//! by older builds keep decoding as long as no discriminant is reused.

use serde::{Deserialize, Serialize};

/// Status ID type matching the INTEGER column.
pub type StatusId = i16;

/// Render job lifecycle status.
///
/// `pending` and `queued` both mean "awaiting a dispatch slot". The three
/// terminal states are final — no transition leaves them.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending = 1,
    Queued = 2,
    Processing = 3,
    Completed = 4,
    Failed = 5,
    Cancelled = 6,
}

/// Terminal statuses: completed, failed, cancelled.
pub const TERMINAL_STATUSES: [JobStatus; 3] =
    [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled];

/// Statuses that satisfy a dispatch claim.
pub const AWAITING_STATUSES: [JobStatus; 2] = [JobStatus::Pending, JobStatus::Queued];

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Decode a database status ID.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Queued),
            3 => Some(Self::Processing),
            4 => Some(Self::Completed),
            5 => Some(Self::Failed),
            6 => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        TERMINAL_STATUSES.contains(&self)
    }

    /// Lowercase label matching the wire/serde form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}
