//! Advisory observation hooks for the upload engine.

use crate::error::Error;
use std::path::Path;
use std::sync::Arc;
use woof_provider::error::Error as ProviderError;

pub type ObserverHandle = Arc<dyn Observer>;

#[derive(Debug)]
pub enum UploadEvent<'a> {
    /// The requested concurrency was unusable and has been replaced.
    ConcurrencyClamped { requested: usize, effective: usize },
    RunStarted { inputs: usize, providers: usize, concurrency: usize },
    ScanFailed { error: &'a Error },
    FileScheduled { path: &'a Path, size: u64 },
    ProviderFailed { path: &'a Path, provider: &'a str, error: &'a ProviderError },
    FileUploaded { path: &'a Path, provider: &'a str, url: &'a str },
    FileFailed { path: &'a Path, error: &'a Error },
    TaskCrashed { error: &'a Error },
    RunFinished { scheduled: usize, cancelled: bool },
}

pub trait Observer: Send + Sync {
    fn observe(&self, event: &UploadEvent<'_>);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&self, _event: &UploadEvent<'_>) {}
}

/// Forwards events to [`tracing`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, event: &UploadEvent<'_>) {
        match *event {
            UploadEvent::ConcurrencyClamped { requested, effective } => {
                tracing::warn!(requested, effective, "Concurrency out of range, clamped");
            },
            UploadEvent::RunStarted { inputs, providers, concurrency } => {
                tracing::info!(inputs, providers, concurrency, "Upload run started");
            },
            UploadEvent::ScanFailed { error } => {
                tracing::warn!(%error, "Scan error");
            },
            UploadEvent::FileScheduled { path, size } => {
                tracing::debug!(path = %path.display(), size, "File scheduled");
            },
            UploadEvent::ProviderFailed { path, provider, error } => {
                tracing::warn!(path = %path.display(), provider, kind = %error.kind(), %error, "Provider failed, trying next");
            },
            UploadEvent::FileUploaded { path, provider, url } => {
                tracing::info!(path = %path.display(), provider, url, "File uploaded");
            },
            UploadEvent::FileFailed { path, error } => {
                tracing::warn!(path = %path.display(), %error, "File upload failed");
            },
            UploadEvent::TaskCrashed { error } => {
                tracing::error!(%error, "Upload task crashed, cancelling remaining uploads");
            },
            UploadEvent::RunFinished { scheduled, cancelled } => {
                tracing::info!(scheduled, cancelled, "Upload run finished");
            },
        }
    }
}
