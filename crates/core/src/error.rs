//! Error taxonomy for the search pipeline.
//!
//! Three classes per the design: transient per-file failures are logged and
//! swallowed by callers (never surfaced as [`MantiError`]), component-level
//! failures fall back to the next strategy, and fatal failures propagate to
//! the CLI boundary as an `Err`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MantiError {
    #[error("invalid search root: {0}")]
    InvalidRoot(PathBuf),

    #[error("scan timed out after {0:?}")]
    ScanTimeout(std::time::Duration),

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("working directory is not writable: {0}")]
    UnwritableWorkDir(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MantiError>;
