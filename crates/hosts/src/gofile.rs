//! GoFile adapter.
//!
//! Multipart `POST` with the file in the `file` field (plus `folderId` when
//! configured). Replies look like
//! `{"status": "ok", "data": {"downloadPage": "...", "id": "...", "fileName": "..."}}`.

use crate::error::Result as HostResult;
use crate::http::{self, Reply};
use crate::settings::ProviderConfig;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use woof_provider::error::{ProviderError, Result};
use woof_provider::provider::ANY_EXTENSION;
use woof_provider::{Provider, ProviderResponse, UploadBody};

pub const NAME: &str = "GoFile";
pub const DEFAULT_UPLOAD_URL: &str = "https://upload.gofile.io/uploadFile";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Deserialize)]
struct UploadReply {
    status: String,
    #[serde(default)]
    data: UploadData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadData {
    #[serde(default)]
    download_page: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    file_name: String,
}

pub struct GoFile {
    client: Client,
    upload_url: String,
    folder_id: Option<String>,
    extensions: Vec<String>,
}

impl GoFile {
    /// Build from settings: `upload_url`, `timeout` and the optional
    /// `folder_id` to upload into.
    pub fn new(config: &ProviderConfig) -> HostResult<Self> {
        let timeout = config.duration("timeout", DEFAULT_TIMEOUT);
        let upload_url = config.string("upload_url").unwrap_or(DEFAULT_UPLOAD_URL);
        let folder_id = config.string("folder_id").map(str::to_string);
        tracing::debug!(provider = NAME, upload_url, ?timeout, folder_id, "Provider configured");
        Ok(Self {
            client: http::client(NAME, timeout)?,
            upload_url: upload_url.to_string(),
            folder_id,
            extensions: vec![ANY_EXTENSION.to_string()],
        })
    }

    fn response(&self, reply: Reply, file_name: &str, size: u64, elapsed: Duration) -> Result<ProviderResponse> {
        if !matches!(reply.status, StatusCode::OK | StatusCode::CREATED) {
            exn::bail!(http::status_error(reply.status, &reply.text));
        }
        let parsed: UploadReply = http::parse_json(&reply.text)?;
        if parsed.status != "ok" {
            exn::bail!(ProviderError::api("UPLOAD_ERROR", format!("upload failed with status: {}", parsed.status)));
        }
        let data = parsed.data;
        if data.download_page.is_empty() {
            exn::bail!(ProviderError::api("MISSING_DOWNLOAD_URL", "upload response missing download URL"));
        }
        if data.id.is_empty() {
            exn::bail!(ProviderError::api("MISSING_ID", "upload response missing file ID"));
        }

        let provider_data = serde_json::json!({
            "status": parsed.status,
            "data": { "downloadPage": data.download_page, "id": data.id, "fileName": data.file_name },
        });
        let mut response = ProviderResponse::new(data.download_page.clone())
            .with_download_url(data.download_page)
            .with_id(data.id.clone())
            .with_metadata("provider", NAME)
            .with_metadata("upload_method", "multipart_form")
            .with_metadata("duration_ms", elapsed.as_millis().to_string())
            .with_metadata("original_name", file_name)
            .with_metadata("upload_size", size.to_string())
            .with_metadata("gofile_id", data.id)
            .with_metadata("gofile_name", data.file_name)
            .with_provider_data(provider_data);
        if let Some(folder_id) = &self.folder_id {
            response = response.with_metadata("folder_id", folder_id.as_str());
        }
        Ok(response)
    }
}

#[async_trait]
impl Provider for GoFile {
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
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        tracing::debug!(provider = NAME, method = "POST", url = %self.upload_url, size, folder_id = self.folder_id, "HTTP request");

        let started = std::time::Instant::now();
        let reply = http::send_streaming(cancel, body, |stream| {
            let mut form = Form::new().part("file", Part::stream_with_length(stream, size).file_name(file_name.clone()));
            if let Some(folder_id) = &self.folder_id {
                form = form.text("folderId", folder_id.clone());
            }
            self.client.post(&self.upload_url).multipart(form)
        })
        .await?;
        let elapsed = started.elapsed();
        tracing::debug!(provider = NAME, status = reply.status.as_u16(), elapsed_ms = elapsed.as_millis() as u64, "HTTP response");

        self.response(reply, &file_name, size, elapsed)
    }

    fn max_file_size(&self) -> u64 {
        0
    }

    fn supported_extensions(&self) -> &[String] {
        &self.extensions
    }
}
