//! Centralized error types for mailrender.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailrender library.
#[derive(Error, Debug)]
pub enum RenderError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The HTML body could not be parsed at all.
    #[error("HTML parse error: {0}")]
    HtmlParse(String),

    /// A MIME decoding error.
    #[error("MIME decoding error: {0}")]
    MimeError(String),

    /// The touch-up hook reported a failure.
    #[error("Touch-up failed: {0}")]
    TouchUp(String),

    /// The touch-up context was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// The touch-up context deadline passed.
    #[error("Operation timed out")]
    Timeout,
}

/// Convenience alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;

impl RenderError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (e.g. child-process pipes; prefer `RenderError::io` for files).
impl From<std::io::Error> for RenderError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
