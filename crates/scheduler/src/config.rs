use std::time::Duration;

/// Scheduler configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of jobs in `processing` at once (default: `2`).
    pub max_concurrent: usize,
    /// Safety-net dispatch tick in seconds (default: `2`). Submission and
    /// job completion wake the loop immediately regardless.
    pub dispatch_interval_secs: u64,
}

impl SchedulerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `MAX_CONCURRENT`         | `2`     |
    /// | `DISPATCH_INTERVAL_SECS` | `2`     |
    pub fn from_env() -> Self {
        let max_concurrent: usize = std::env::var("MAX_CONCURRENT")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("MAX_CONCURRENT must be a positive integer");

        let dispatch_interval_secs: u64 = std::env::var("DISPATCH_INTERVAL_SECS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("DISPATCH_INTERVAL_SECS must be a positive integer");

        Self {
            max_concurrent: max_concurrent.max(1),
            dispatch_interval_secs: dispatch_interval_secs.max(1),
        }
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            dispatch_interval_secs: 2,
        }
    }
}
