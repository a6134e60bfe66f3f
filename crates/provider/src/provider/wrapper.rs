//! Consistency wrapper.
//!
//! Decorates any [`Provider`] so that, from the engine's point of view, every
//! adapter validates, retries and shapes its responses the same way.

use crate::error::{self, ProviderError, Result};
use crate::observer::{ObserverHandle, TracingObserver, WrapperEvent};
use crate::provider::{Provider, UploadBody, extension_supported, file_extension};
use crate::{ProviderHandle, ProviderResponse};
use async_trait::async_trait;
use exn::ResultExt;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::io::AsyncSeekExt;
use tokio_util::sync::CancellationToken;

/// Version tag injected into enhanced response metadata.
pub const WRAPPER_VERSION: &str = "1.0";

/// Which consistency features a [`ConsistencyWrapper`] applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapperConfig {
    /// Run capability checks and the adapter's own validation before uploading.
    pub pre_upload_validation: bool,
    /// Reject successful responses without a URL.
    pub validate_responses: bool,
    /// Retry retryable failures.
    pub auto_retry: bool,
    /// Retries after the first attempt (so `max_retries + 1` attempts total).
    pub max_retries: u32,
    /// Base delay for the linear backoff between attempts.
    pub retry_delay: Duration,
    /// Add wrapper metadata and backfill the URL on success.
    pub enhance_responses: bool,
    /// Compare size and extension against what the adapter advertises.
    pub check_capabilities: bool,
}
impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            pre_upload_validation: true,
            validate_responses: true,
            auto_retry: true,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            enhance_responses: true,
            check_capabilities: true,
        }
    }
}

/// Provider decorator enforcing uniform validation, retry and response shape.
///
/// The wrapper is itself a [`Provider`], so wrapped and unwrapped adapters are
/// interchangeable wherever a [`ProviderHandle`] is expected.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use woof_provider::{ConsistencyWrapper, ProviderHandle, WrapperConfig};
///
/// fn harden(provider: ProviderHandle) -> ProviderHandle {
///     let config = WrapperConfig {
///         max_retries: 5,
///         retry_delay: Duration::from_millis(500),
///         ..WrapperConfig::default()
///     };
///     Arc::new(ConsistencyWrapper::new(provider, config))
/// }
/// ```
#[derive(Clone)]
pub struct ConsistencyWrapper {
    inner: ProviderHandle,
    config: WrapperConfig,
    observer: ObserverHandle,
}

impl ConsistencyWrapper {
    pub fn new(inner: ProviderHandle, config: WrapperConfig) -> Self {
        Self {
            inner,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the default [`TracingObserver`].
    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    pub fn inner(&self) -> &ProviderHandle {
        &self.inner
    }

    /// Pre-upload validation: advertised capabilities first (when enabled),
    /// then the adapter's own [`validate_file`](Provider::validate_file).
    ///
    /// Holds no state, so identical inputs always get identical answers.
    pub async fn validate(&self, cancel: &CancellationToken, path: &Path, size: u64) -> Result<()> {
        if self.config.check_capabilities {
            let provider = self.inner.name();
            let max_size = self.inner.max_file_size();
            if max_size > 0 && size > max_size {
                exn::bail!(ProviderError::file_too_large(format!(
                    "file size {size} bytes exceeds provider {provider} maximum {max_size} bytes"
                )));
            }
            let extensions = self.inner.supported_extensions();
            if !extension_supported(extensions, path) {
                let extension = file_extension(path).map(|ext| format!(".{ext}")).unwrap_or_default();
                exn::bail!(ProviderError::unsupported(format!(
                    "file extension `{extension}` not supported by provider {provider} (supported: {})",
                    extensions.join(", ")
                )));
            }
        }
        self.inner.validate_file(cancel, path, size).await
    }

    async fn upload_with_retry(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        body: &mut dyn UploadBody,
        size: u64,
    ) -> Result<ProviderResponse> {
        let provider = self.inner.name();
        let max_attempts = match self.config.auto_retry {
            true => self.config.max_retries.saturating_add(1),
            false => 1,
        };
        let mut attempt: u32 = 1;
        loop {
            if attempt > 1 {
                let delay = self.config.retry_delay.saturating_mul(attempt - 1);
                self.observer.observe(&WrapperEvent::Retrying { provider, path, attempt, max_attempts, delay });
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(error::cancelled(format!("upload cancelled before attempt {attempt}"))),
                    _ = tokio::time::sleep(delay) => {},
                }
                // Previous attempt may have consumed any amount of the body.
                body.seek(SeekFrom::Start(0))
                    .await
                    .or_raise(|| ProviderError::unknown("failed to rewind upload body before retry"))?;
            }

            let error = match self.inner.upload(cancel, path, body, size).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            let retryable = error.should_retry();
            let retrying = retryable && attempt < max_attempts;
            self.observer.observe(&WrapperEvent::AttemptFailed { provider, path, attempt, error: &error, retrying });
            if retrying {
                attempt += 1;
                continue;
            }
            if !retryable || !self.config.auto_retry {
                return Err(error);
            }
            self.observer.observe(&WrapperEvent::RetriesExhausted { provider, path, attempts: attempt, error: &error });
            let message = format!("all {attempt} retry attempts failed, last error: {}", &*error);
            return Err(error.raise(ProviderError::temporary(message)));
        }
    }

    fn enhance(&self, response: &mut ProviderResponse, path: &Path, size: u64) {
        let metadata = &mut response.metadata;
        metadata.insert("wrapper_provider".to_string(), self.inner.name().to_string());
        metadata.insert("wrapper_version".to_string(), WRAPPER_VERSION.to_string());
        if let Ok(timestamp) = OffsetDateTime::now_utc().format(&Rfc3339) {
            metadata.insert("upload_timestamp".to_string(), timestamp);
        }
        metadata.insert("original_filepath".to_string(), path.display().to_string());
        metadata.insert("upload_size".to_string(), size.to_string());
        if response.url.is_empty()
            && let Some(download_url) = response.download_url.as_ref().filter(|url| !url.is_empty())
        {
            response.url = download_url.clone();
        }
        self.observer.observe(&WrapperEvent::Enhanced {
            provider: self.inner.name(),
            path,
            metadata: response.metadata.len(),
        });
    }

    fn validate_response(response: &ProviderResponse) -> Result<()> {
        if response.url.is_empty() {
            exn::bail!(ProviderError::api("MISSING_URL", "provider response missing download URL"));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for ConsistencyWrapper {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn upload(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        body: &mut dyn UploadBody,
        size: u64,
    ) -> Result<ProviderResponse> {
        let provider = self.inner.name();
        self.observer.observe(&WrapperEvent::Started { provider, path, size });

        if self.config.pre_upload_validation
            && let Err(error) = self.validate(cancel, path, size).await
        {
            self.observer.observe(&WrapperEvent::ValidationFailed { provider, path, error: &error });
            self.observer.observe(&WrapperEvent::Finished { provider, path, success: false });
            return Err(error);
        }

        let mut response = match self.upload_with_retry(cancel, path, body, size).await {
            Ok(response) => response,
            Err(error) => {
                self.observer.observe(&WrapperEvent::Finished { provider, path, success: false });
                return Err(error);
            },
        };
        if self.config.enhance_responses {
            self.enhance(&mut response, path, size);
        }
        if self.config.validate_responses
            && let Err(error) = Self::validate_response(&response)
        {
            self.observer.observe(&WrapperEvent::ResponseRejected { provider, path, error: &error });
            self.observer.observe(&WrapperEvent::Finished { provider, path, success: false });
            return Err(error);
        }

        self.observer.observe(&WrapperEvent::Finished { provider, path, success: true });
        Ok(response)
    }

    async fn validate_file(&self, cancel: &CancellationToken, path: &Path, size: u64) -> Result<()> {
        self.inner.validate_file(cancel, path, size).await
    }

    fn max_file_size(&self) -> u64 {
        self.inner.max_file_size()
    }

    fn supported_extensions(&self) -> &[String] {
        self.inner.supported_extensions()
    }
}
