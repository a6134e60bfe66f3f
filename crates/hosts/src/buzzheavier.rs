//! BuzzHeavier adapter.
//!
//! The file goes up as the raw body of `PUT {upload_url}/{file name}`; the
//! service answers with `{"code": 200, "data": {"id": "..."}}` and the file
//! is then served from `{download_base_url}/{id}`.

use crate::error::Result as HostResult;
use crate::http::{self, Reply};
use crate::settings::ProviderConfig;
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use woof_provider::error::{ProviderError, Result};
use woof_provider::provider::ANY_EXTENSION;
use woof_provider::{Provider, ProviderResponse, UploadBody};

pub const NAME: &str = "BuzzHeavier";
pub const DEFAULT_UPLOAD_URL: &str = "https://w.buzzheavier.com";
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://buzzheavier.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// 10 GiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct UploadReply {
    code: u16,
    #[serde(default)]
    data: UploadData,
}

#[derive(Debug, Default, Deserialize)]
struct UploadData {
    #[serde(default)]
    id: String,
}

pub struct BuzzHeavier {
    client: Client,
    upload_url: String,
    download_base_url: String,
    max_file_size: u64,
    extensions: Vec<String>,
}

impl BuzzHeavier {
    /// Build from settings: `upload_url`, `download_base_url`, `timeout` and
    /// `max_file_size` (bytes), each falling back to its default.
    pub fn new(config: &ProviderConfig) -> HostResult<Self> {
        let timeout = config.duration("timeout", DEFAULT_TIMEOUT);
        let upload_url = config.string("upload_url").unwrap_or(DEFAULT_UPLOAD_URL);
        let download_base_url = config.string("download_base_url").unwrap_or(DEFAULT_DOWNLOAD_BASE_URL);
        let max_file_size = config.bytes("max_file_size")?.unwrap_or(DEFAULT_MAX_FILE_SIZE);
        tracing::debug!(provider = NAME, upload_url, download_base_url, ?timeout, max_file_size, "Provider configured");
        Ok(Self {
            client: http::client(NAME, timeout)?,
            upload_url: upload_url.trim_end_matches('/').to_string(),
            download_base_url: download_base_url.trim_end_matches('/').to_string(),
            max_file_size,
            extensions: vec![ANY_EXTENSION.to_string()],
        })
    }

    fn response(&self, reply: Reply, file_name: &str, size: u64, elapsed: Duration) -> Result<ProviderResponse> {
        if !matches!(reply.status, StatusCode::OK | StatusCode::CREATED) {
            exn::bail!(http::status_error(reply.status, &reply.text));
        }
        let parsed: UploadReply = http::parse_json(&reply.text)?;
        if !matches!(parsed.code, 200 | 201) {
            exn::bail!(ProviderError::api(parsed.code.to_string(), format!("upload failed with code {}", parsed.code)));
        }
        if parsed.data.id.is_empty() {
            exn::bail!(ProviderError::api("MISSING_ID", "upload response missing file ID"));
        }
        let url = format!("{}/{}", self.download_base_url, parsed.data.id);
        Ok(ProviderResponse::new(url.clone())
            .with_download_url(url)
            .with_id(parsed.data.id.clone())
            .with_metadata("provider", NAME)
            .with_metadata("upload_method", "direct")
            .with_metadata("duration_ms", elapsed.as_millis().to_string())
            .with_metadata("original_name", file_name)
            .with_metadata("upload_size", size.to_string())
            .with_provider_data(serde_json::json!({ "code": parsed.code, "data": { "id": parsed.data.id } })))
    }
}

#[async_trait]
impl Provider for BuzzHeavier {
    fn name(&self) -> &str {
        NAME
    }

    async fn upload(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        body: &mut dyn UploadBody,
        size: u64,
    ) -> Result<ProviderResponse> {
        self.validate_file(cancel, path, size).await?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let url = format!("{}/{}", self.upload_url, file_name);
        tracing::debug!(provider = NAME, method = "PUT", %url, size, "HTTP request");

        let started = std::time::Instant::now();
        let reply = http::send_streaming(cancel, body, |stream| {
            self.client
                .put(&url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(CONTENT_LENGTH, size)
                .body(stream)
        })
        .await?;
        let elapsed = started.elapsed();
        tracing::debug!(provider = NAME, status = reply.status.as_u16(), elapsed_ms = elapsed.as_millis() as u64, "HTTP response");

        self.response(reply, &file_name, size, elapsed)
    }

    async fn validate_file(&self, _cancel: &CancellationToken, _path: &Path, size: u64) -> Result<()> {
        if self.max_file_size > 0 && size > self.max_file_size {
            exn::bail!(ProviderError::file_too_large(format!(
                "file size {size} bytes exceeds maximum {} bytes",
                self.max_file_size
            )));
        }
        Ok(())
    }

    fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    fn supported_extensions(&self) -> &[String] {
        &self.extensions
    }
}
