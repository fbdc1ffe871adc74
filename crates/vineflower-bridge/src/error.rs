use crate::artifact::DownloadError;
use std::sync::Arc;

/// Failure of a resolution-pipeline stage.
///
/// Stage results are shared between every caller awaiting the same
/// generation, so the error is cheap to clone.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("Engine download failed: {0}")]
    Download(Arc<DownloadError>),
    #[error("Failed to build decompiler context: {0:#}")]
    Context(Arc<anyhow::Error>),
    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    pub fn context(err: anyhow::Error) -> Self {
        Self::Context(Arc::new(err))
    }
}

impl From<DownloadError> for PipelineError {
    fn from(err: DownloadError) -> Self {
        Self::Download(Arc::new(err))
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Outcome of a single decompile call that produced no text.
#[derive(Debug, thiserror::Error)]
pub enum DecompileError {
    /// The host cancelled the call, or the engine asked to abandon it.
    #[error("Decompilation cancelled")]
    Cancelled,
    /// The feature is disabled or the pipeline is in a failed state.
    #[error("Decompiler unavailable: {0}")]
    Unavailable(String),
    /// Raised instead of a placeholder body while the host runs unit tests.
    #[error("Decompilation of {file} failed: {message}")]
    Failed { file: String, message: String },
}
