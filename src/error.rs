//! Command Line Error Types
//!
//! Failures that stop a command before or around an upload run. Per-file
//! failures are not errors at this level: they arrive as failed results and
//! only affect the exit status.

use derive_more::{Display, Error};
use exn::Frame;
use std::path::PathBuf;

/// A command error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for command operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Configuration could not be read or has the wrong shape.
    #[display("failed to load configuration")]
    Config,
    /// The `--config` file does not exist.
    #[display("config file not found: {}", _0.display())]
    ConfigNotFound(#[error(not(source))] PathBuf),
    #[display("no files or folders specified. Use --file/-f for files or --folder/-d for directories")]
    NoInput,
    #[display("invalid glob pattern `{_0}`")]
    InvalidPattern(#[error(not(source))] String),
    #[display("file does not exist: {}", _0.display())]
    FileNotFound(#[error(not(source))] PathBuf),
    #[display("directory does not exist: {}", _0.display())]
    DirectoryNotFound(#[error(not(source))] PathBuf),
    #[display("path '{}' is a directory, but --file/-f requires a file. Use --folder/-d for directories", _0.display())]
    NotAFile(#[error(not(source))] PathBuf),
    #[display("path '{}' is a file, but --folder/-d requires a directory. Use --file/-f for files", _0.display())]
    NotADirectory(#[error(not(source))] PathBuf),
    /// Checking a path failed for a reason other than it being absent.
    #[display("error checking {}", _0.display())]
    PathCheck(#[error(not(source))] PathBuf),
    #[display("failed to create providers")]
    Providers,
    /// Nothing to upload with; carries the help text shown to the user.
    #[display("{_0}")]
    NoProviders(#[error(not(source))] String),
    #[display("failed to start upload")]
    Upload,
    #[display("failed to write output")]
    Output,
}

/// One line for the user: every message in the error tree, outermost first,
/// joined with `: `. A cause already quoted at the end of its parent's message
/// is not repeated.
pub fn report(error: &Error) -> String {
    let mut messages = Vec::new();
    collect(error.frame(), &mut messages);
    messages.join(": ")
}

fn collect(frame: &Frame, messages: &mut Vec<String>) {
    let message = frame.to_string();
    if !messages.last().is_some_and(|parent: &String| parent.ends_with(&message)) {
        messages.push(message);
    }
    for child in frame.children() {
        collect(child, messages);
    }
}
