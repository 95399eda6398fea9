//! Errors for infrastructural failures. Per-file failures are never errors;
//! they are recorded in [`confcheck_core::Outcome`] values.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Filesystem I/O error outside a single file's validation.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration or storage collaborator error.
    #[error(transparent)]
    Core(#[from] confcheck_core::CoreError),

    /// The report could not be written to any location.
    #[error("unable to write report file, tried: {}", display_paths(.tried))]
    ReportExhausted { tried: Vec<PathBuf> },

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// A background task failed to complete.
    #[error("background task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
