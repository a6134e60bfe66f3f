//! Provider trait and decorators.
//!
//! This module defines the [`Provider`] trait, the uniform contract every
//! hosting-service adapter implements, plus the decorators layered on top of
//! adapters (currently the [`ConsistencyWrapper`]).

#[cfg(any(test, feature = "mock"))]
mod mock;
mod wrapper;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockBehaviour, MockProvider};
pub use self::wrapper::{ConsistencyWrapper, WRAPPER_VERSION, WrapperConfig};
use crate::error::Result;
use crate::response::ProviderResponse;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncSeek};
use tokio_util::sync::CancellationToken;

/// Extension entry meaning "every extension is accepted".
pub const ANY_EXTENSION: &str = "*";

/// Byte source handed to [`Provider::upload`].
///
/// Sources must be seekable: the same source is replayed for every retry and
/// every fallback provider, each starting from offset zero.
pub trait UploadBody: AsyncRead + AsyncSeek + Send + Unpin {}
impl<T: AsyncRead + AsyncSeek + Send + Unpin + ?Sized> UploadBody for T {}

/// Unified interface for file-hosting services.
///
/// Adapters perform exactly one attempt per call; retries, capability checks
/// and response normalization are the job of the [`ConsistencyWrapper`].
/// Every method takes the run's [`CancellationToken`] so that long network
/// operations can bail out early.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
/// use woof_provider::{Provider, error::Result};
///
/// async fn upload_bytes(provider: &dyn Provider, data: &[u8]) -> Result<String> {
///     let cancel = CancellationToken::new();
///     let mut body = std::io::Cursor::new(data.to_vec());
///     let path = Path::new("hello.txt");
///     provider.validate_file(&cancel, path, data.len() as u64).await?;
///     let response = provider.upload(&cancel, path, &mut body, data.len() as u64).await?;
///     Ok(response.url)
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name, used in results and logs.
    fn name(&self) -> &str;

    /// Upload `size` bytes read from `body`, identified by `path` (only the
    /// file name is meaningful to most services).
    async fn upload(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        body: &mut dyn UploadBody,
        size: u64,
    ) -> Result<ProviderResponse>;

    /// Provider-specific checks beyond the advertised capabilities.
    ///
    /// Default implementation accepts everything.
    async fn validate_file(&self, _cancel: &CancellationToken, _path: &Path, _size: u64) -> Result<()> {
        Ok(())
    }

    /// Largest accepted upload in bytes; `0` means unlimited.
    fn max_file_size(&self) -> u64 {
        0
    }

    /// Accepted file extensions, compared case-insensitively with or without
    /// the leading dot. An entry of [`ANY_EXTENSION`] (or an empty list)
    /// accepts everything.
    fn supported_extensions(&self) -> &[String] {
        &[]
    }
}

/// Returns `true` if `path` has an extension allowed by `extensions`.
pub fn extension_supported(extensions: &[String], path: &Path) -> bool {
    if extensions.is_empty() || extensions.iter().any(|ext| ext.trim() == ANY_EXTENSION) {
        return true;
    }
    let Some(actual) = file_extension(path) else {
        return false;
    };
    extensions.iter().any(|ext| ext.trim().trim_start_matches('.').eq_ignore_ascii_case(&actual))
}

/// Lowercase extension of `path` without the leading dot.
pub(crate) fn file_extension(path: &Path) -> Option<String> {
    path.extension().and_then(|ext| ext.to_str()).filter(|ext| !ext.is_empty()).map(str::to_lowercase)
}
