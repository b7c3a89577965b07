/// Error type for graph construction and render-engine supervision.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The template cannot be turned into a runnable graph. Raised before
    /// any external process is spawned.
    #[error("filter graph build failed: {0}")]
    GraphBuild(String),

    #[error("render engine binary could not be spawned: {0}")]
    Spawn(std::io::Error),

    /// The engine process exited nonzero; `stderr` carries its diagnostic
    /// output verbatim (capped).
    #[error("render engine exited with code {exit_code:?}: {stderr}")]
    EngineFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
