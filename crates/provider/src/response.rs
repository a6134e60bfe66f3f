//! Normalized upload responses.

use serde::Serialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Structured response of a successful upload, identical across providers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProviderResponse {
    /// Primary URL to share. Never empty once the response has been through
    /// a [`ConsistencyWrapper`](crate::ConsistencyWrapper) with response
    /// validation enabled.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_url: Option<String>,
    /// Identifier assigned by the hosting service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub expires: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Raw provider payload, for callers that know what to look for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_data: Option<serde_json::Value>,
}

impl ProviderResponse {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Default::default() }
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_provider_data(mut self, data: serde_json::Value) -> Self {
        self.provider_data = Some(data);
        self
    }
}
