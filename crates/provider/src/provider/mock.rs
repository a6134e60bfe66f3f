//! Scriptable in-memory provider for testing.

use crate::error::{ProviderError, Result};
use crate::provider::{Provider, UploadBody};
use crate::response::ProviderResponse;
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

/// Outcome of a single [`MockProvider::upload`] call.
#[derive(Clone, Debug)]
pub enum MockBehaviour {
    /// Consume the body, then return this response.
    Succeed(ProviderResponse),
    /// Consume the body, then fail.
    Fail(ProviderError),
}

/// In-memory provider for testing.
///
/// Each upload call reads the whole body, records it, and then answers with
/// the next scripted [`MockBehaviour`]; once the script runs dry, the
/// fallback behaviour answers every remaining call. Call counts and the peak
/// number of concurrent uploads are tracked for assertions.
///
/// # Examples
///
/// ```ignore
/// use woof_provider::error::ProviderError;
/// use woof_provider::provider::{MockBehaviour, MockProvider};
///
/// // Fails twice with a network error, then succeeds for good.
/// let provider = MockProvider::succeeding("flaky", "https://example.com/abc").with_script([
///     MockBehaviour::Fail(ProviderError::network("connection reset")),
///     MockBehaviour::Fail(ProviderError::network("connection reset")),
/// ]);
/// assert_eq!(provider.calls(), 0);
/// ```
pub struct MockProvider {
    name: String,
    max_file_size: u64,
    extensions: Vec<String>,
    delay: Duration,
    validation_error: Option<ProviderError>,
    script: Mutex<VecDeque<MockBehaviour>>,
    fallback: MockBehaviour,
    bodies: Mutex<Vec<Vec<u8>>>,
    calls: AtomicU32,
    validations: AtomicU32,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: impl Into<String>, fallback: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            max_file_size: 0,
            extensions: Vec::new(),
            delay: Duration::ZERO,
            validation_error: None,
            script: Mutex::new(VecDeque::new()),
            fallback,
            bodies: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            validations: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Provider that always succeeds with `url`.
    pub fn succeeding(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::Succeed(ProviderResponse::new(url)))
    }

    /// Provider that always fails with `error`.
    pub fn failing(name: impl Into<String>, error: ProviderError) -> Self {
        Self::new(name, MockBehaviour::Fail(error))
    }

    /// Behaviours answered (in order) before the fallback kicks in.
    pub fn with_script(self, behaviours: impl IntoIterator<Item = MockBehaviour>) -> Self {
        lock(&self.script).extend(behaviours);
        self
    }

    /// Hold every upload for `delay` before reading the body.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn with_extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Make [`Provider::validate_file`] reject every file with `error`.
    pub fn with_validation_error(mut self, error: ProviderError) -> Self {
        self.validation_error = Some(error);
        self
    }

    /// Number of upload calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of [`Provider::validate_file`] calls so far.
    pub fn validations(&self) -> u32 {
        self.validations.load(Ordering::SeqCst)
    }

    /// Highest number of uploads that were in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Bodies received so far, in call order.
    pub fn bodies(&self) -> Vec<Vec<u8>> {
        lock(&self.bodies).clone()
    }

    fn next_behaviour(&self) -> MockBehaviour {
        lock(&self.script).pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(
        &self,
        cancel: &CancellationToken,
        _path: &Path,
        body: &mut dyn UploadBody,
        _size: u64,
    ) -> Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(crate::error::cancelled("upload cancelled")),
                _ = tokio::time::sleep(self.delay) => {},
            }
        }

        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .await
            .or_raise(|| ProviderError::network("failed to read upload body"))?;
        lock(&self.bodies).push(data);

        match self.next_behaviour() {
            MockBehaviour::Succeed(response) => Ok(response),
            MockBehaviour::Fail(error) => Err(error.into()),
        }
    }

    async fn validate_file(&self, _cancel: &CancellationToken, _path: &Path, _size: u64) -> Result<()> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        match &self.validation_error {
            Some(error) => Err(error.clone().into()),
            None => Ok(()),
        }
    }

    fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    fn supported_extensions(&self) -> &[String] {
        &self.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let mock = MockProvider::succeeding("mock", "https://mock/ok")
            .with_script([MockBehaviour::Fail(ProviderError::quota("slow down"))]);
        let cancel = CancellationToken::new();
        let path = Path::new("a.txt");

        let mut body = Cursor::new(b"abc".to_vec());
        assert!(mock.upload(&cancel, path, &mut body, 3).await.is_err());
        let mut body = Cursor::new(b"def".to_vec());
        let response = mock.upload(&cancel, path, &mut body, 3).await.unwrap();

        assert_eq!(response.url, "https://mock/ok");
        assert_eq!(mock.calls(), 2);
        assert_eq!(mock.bodies(), [b"abc".to_vec(), b"def".to_vec()]);
        assert_eq!(mock.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_while_delayed() {
        let mock = MockProvider::succeeding("mock", "u").with_delay(Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut body = Cursor::new(Vec::new());
        let err = mock.upload(&cancel, Path::new("a.txt"), &mut body, 0).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(mock.bodies().is_empty());
    }
}
