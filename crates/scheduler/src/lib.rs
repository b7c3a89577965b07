//! Reelsmith batch scheduler (PRD-07).
//!
//! Accepts render job submissions, persists them, and drives a bounded set
//! of concurrent renders through the job status lifecycle, emitting
//! [`RenderEvent`](reelsmith_events::RenderEvent)s along the way.

pub mod config;
pub mod pipeline;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use pipeline::{PipelineError, ProgressSink, RenderPipeline};
pub use scheduler::{BatchScheduler, SchedulerError};
