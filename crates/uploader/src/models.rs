use crate::error::Error;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use woof_provider::{ProviderHandle, WrapperConfig};

/// A filesystem entry discovered by [`scan`](crate::scan).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: PathBuf,
    /// Base name of `path`.
    pub name: String,
    pub size: u64,
    pub modified: OffsetDateTime,
    pub is_dir: bool,
}

/// Outcome of one scheduled file (or one scan error).
///
/// Exactly one is produced per non-directory file; `url` and `provider` are
/// empty on failure and `error` is `None` on success.
#[derive(Debug)]
pub struct UploadResult {
    pub file_name: String,
    pub file_path: PathBuf,
    pub size: u64,
    pub url: String,
    pub provider: String,
    pub duration: Duration,
    pub error: Option<Error>,
    pub completed_at: OffsetDateTime,
}

impl UploadResult {
    pub(crate) fn success(file: &FileDescriptor, provider: &str, url: String, duration: Duration) -> Self {
        Self {
            file_name: file.name.clone(),
            file_path: file.path.clone(),
            size: file.size,
            url,
            provider: provider.to_string(),
            duration,
            error: None,
            completed_at: OffsetDateTime::now_utc(),
        }
    }

    pub(crate) fn failure(file: &FileDescriptor, error: Error, duration: Duration) -> Self {
        Self {
            file_name: file.name.clone(),
            file_path: file.path.clone(),
            size: file.size,
            url: String::new(),
            provider: String::new(),
            duration,
            error: Some(error),
            completed_at: OffsetDateTime::now_utc(),
        }
    }

    /// A result that isn't about any particular file (scan errors, crashed tasks).
    pub(crate) fn orphan(error: Error) -> Self {
        Self {
            file_name: String::new(),
            file_path: PathBuf::new(),
            size: 0,
            url: String::new(),
            provider: String::new(),
            duration: Duration::ZERO,
            error: Some(error),
            completed_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Snapshot of an in-flight upload. Lossy: snapshots are dropped rather than
/// slowing the upload down.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressInfo {
    pub file_name: String,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    pub percentage: f64,
    /// Bytes per second since the attempt started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl ProgressInfo {
    pub fn new(file_name: impl Into<String>, bytes_uploaded: u64, total_bytes: u64, elapsed: Duration) -> Self {
        let seconds = elapsed.as_secs_f64();
        Self {
            file_name: file_name.into(),
            bytes_uploaded,
            total_bytes,
            percentage: percentage(bytes_uploaded, total_bytes),
            speed: (seconds > 0.0).then(|| bytes_uploaded as f64 / seconds),
        }
    }
}

/// Share of `total` that `bytes` represents, in percent. An empty file is
/// complete by definition.
pub fn percentage(bytes: u64, total: u64) -> f64 {
    match total {
        0 => 100.0,
        total => bytes as f64 / total as f64 * 100.0,
    }
}

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[display("text")]
    Text,
    #[display("json")]
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format `{other}` (expected `text` or `json`)")),
        }
    }
}

/// Settings for one engine run. The engine never modifies it.
#[derive(Clone)]
pub struct UploadConfig {
    /// Upper bound on simultaneous uploads; `0` is treated as `1`.
    pub concurrency: usize,
    /// Providers in fallback order.
    pub providers: Vec<ProviderHandle>,
    pub output: OutputFormat,
    pub verbose: bool,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            providers: Vec::new(),
            output: OutputFormat::Text,
            verbose: false,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl UploadConfig {
    /// Wrapper settings matching this run's retry policy.
    pub fn wrapper_config(&self) -> WrapperConfig {
        WrapperConfig {
            max_retries: self.retry_attempts,
            retry_delay: self.retry_delay,
            ..WrapperConfig::default()
        }
    }
}

impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("UploadConfig")
            .field("concurrency", &self.concurrency)
            .field("providers", &providers)
            .field("output", &self.output)
            .field("verbose", &self.verbose)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string())
}
