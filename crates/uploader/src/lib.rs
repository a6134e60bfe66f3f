//! Concurrent upload engine.
//!
//! Walks the requested paths, fans the files out over a bounded pool of
//! upload tasks and tries the configured providers in order for each file.
//! Callers get two channels back: exactly one [`UploadResult`] per file, and
//! a lossy stream of [`ProgressInfo`] snapshots.
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use woof_uploader::{UploadConfig, Uploader};
//!
//! # async fn example(config: UploadConfig) -> woof_uploader::error::Result<()> {
//! let cancel = CancellationToken::new();
//! let (mut results, _progress) = Uploader::new().upload(&cancel, vec!["./photos".into()], &config)?;
//! while let Some(result) = results.recv().await {
//!     println!("{} -> {}", result.file_name, result.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
mod models;
pub mod observer;
mod pool;
mod progress;
mod scan;

pub use crate::models::{FileDescriptor, OutputFormat, ProgressInfo, UploadConfig, UploadResult, percentage};
pub use crate::pool::{Channels, Uploader};
pub use crate::progress::ProgressReader;
pub use crate::scan::scan;
