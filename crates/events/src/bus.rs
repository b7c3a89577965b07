//! Publish/subscribe hub for [`RenderEvent`]s over `tokio::sync::broadcast`.
//!
//! Shared via `Arc<EventBus>` between the scheduler (the only publisher)
//! and any number of observers (log mirror, a frontend's push channel).

use reelsmith_core::types::EntityId;
use reelsmith_db::models::job::Job;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// RenderEvent
// ---------------------------------------------------------------------------

/// A job lifecycle event. Fire-and-observe: emitters never wait for
/// acknowledgment, and delivery order per subscriber matches publish order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RenderEvent {
    /// A job was persisted and is awaiting a dispatch slot.
    JobQueued { job: Job },

    /// A job was promoted to `processing` and its render started.
    JobStarted { job: Job },

    /// The render made progress.
    JobProgress {
        job_id: EntityId,
        /// Completion percentage (0-100).
        percent: i32,
        /// Pipeline stage, e.g. `"encoding"`.
        stage: String,
    },

    /// A job finished successfully.
    JobCompleted { job: Job },

    /// A job failed; `error` matches the stored `error_message`.
    JobFailed { job: Job, error: String },

    /// No job is queued or processing anymore.
    QueueEmpty,
}

impl RenderEvent {
    /// Stable kebab-case name of the event kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JobQueued { .. } => "job-queued",
            Self::JobStarted { .. } => "job-started",
            Self::JobProgress { .. } => "job-progress",
            Self::JobCompleted { .. } => "job-completed",
            Self::JobFailed { .. } => "job-failed",
            Self::QueueEmpty => "queue-empty",
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus: every subscriber independently receives every published
/// event, in publish order.
pub struct EventBus {
    sender: broadcast::Sender<RenderEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity. A subscriber that
    /// falls more than `capacity` events behind observes
    /// `RecvError::Lagged` and loses the oldest entries.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. With zero subscribers the event
    /// is dropped; the job table remains the durable record of lifecycle
    /// state.
    pub fn publish(&self, event: RenderEvent) {
        // SendError here only means there are no receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RenderEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
