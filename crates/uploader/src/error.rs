//! Upload Engine Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Provider failures are attached as
//! children of the engine error that summarizes them, so the full history of
//! a failed file survives in one tree.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

/// An upload engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for upload engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File or directory does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied while scanning or opening
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Walking an input path failed; carries the underlying reason.
    #[display("scan error: {_0}")]
    Scan(#[error(not(source))] String),
    /// Every configured provider rejected the file.
    #[display("all {count} providers failed, last error: {last}")]
    AllProvidersFailed {
        count: usize,
        #[error(not(source))]
        last: String,
    },
    /// An upload task died without producing a result.
    #[display("upload task failed: {_0}")]
    TaskFailed(#[error(not(source))] String),
    /// The engine cannot start without at least one provider.
    #[display("no providers configured")]
    NoProviders,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    pub(crate) fn from_io(err: IoError, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}
