//! Advisory observation hooks for the consistency wrapper.
//!
//! Observers are handed to a [`ConsistencyWrapper`](crate::ConsistencyWrapper)
//! at construction. They see every stage of an upload but have no way to
//! influence it: [`Observer::observe`] returns nothing and its outcome is
//! ignored.

use crate::error::ProviderError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub type ObserverHandle = Arc<dyn Observer>;

/// A stage of a wrapped upload.
#[derive(Debug)]
pub enum WrapperEvent<'a> {
    Started { provider: &'a str, path: &'a Path, size: u64 },
    ValidationFailed { provider: &'a str, path: &'a Path, error: &'a ProviderError },
    /// About to wait `delay` before attempt number `attempt` (1-based).
    Retrying { provider: &'a str, path: &'a Path, attempt: u32, max_attempts: u32, delay: Duration },
    AttemptFailed { provider: &'a str, path: &'a Path, attempt: u32, error: &'a ProviderError, retrying: bool },
    RetriesExhausted { provider: &'a str, path: &'a Path, attempts: u32, error: &'a ProviderError },
    Enhanced { provider: &'a str, path: &'a Path, metadata: usize },
    ResponseRejected { provider: &'a str, path: &'a Path, error: &'a ProviderError },
    Finished { provider: &'a str, path: &'a Path, success: bool },
}

pub trait Observer: Send + Sync {
    fn observe(&self, event: &WrapperEvent<'_>);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&self, _event: &WrapperEvent<'_>) {}
}

/// Forwards events to [`tracing`] at debug level (failures at warn).
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, event: &WrapperEvent<'_>) {
        match *event {
            WrapperEvent::Started { provider, path, size } => {
                tracing::debug!(provider, path = %path.display(), size, "Provider upload start");
            },
            WrapperEvent::ValidationFailed { provider, path, error } => {
                tracing::warn!(provider, path = %path.display(), kind = %error.kind(), %error, "Pre-upload validation failed");
            },
            WrapperEvent::Retrying { provider, path, attempt, max_attempts, delay } => {
                tracing::debug!(provider, path = %path.display(), attempt, max_attempts, delay_ms = delay.as_millis() as u64, "Provider retry attempt");
            },
            WrapperEvent::AttemptFailed { provider, path, attempt, error, retrying } => {
                tracing::debug!(provider, path = %path.display(), attempt, kind = %error.kind(), retrying, %error, "Provider attempt failed");
            },
            WrapperEvent::RetriesExhausted { provider, path, attempts, error } => {
                tracing::warn!(provider, path = %path.display(), attempts, %error, "All retry attempts failed");
            },
            WrapperEvent::Enhanced { provider, path, metadata } => {
                tracing::trace!(provider, path = %path.display(), metadata, "Provider metadata added");
            },
            WrapperEvent::ResponseRejected { provider, path, error } => {
                tracing::warn!(provider, path = %path.display(), %error, "Provider response failed validation");
            },
            WrapperEvent::Finished { provider, path, success } => {
                tracing::debug!(provider, path = %path.display(), success, "Provider upload complete");
            },
        }
    }
}
