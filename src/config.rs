//! Layered configuration.
//!
//! Lowest to highest precedence: built-in defaults, the YAML file given with
//! `--config` (never searched for), `WOOF_*` environment variables with nested
//! keys separated by `__` (`WOOF_UPLOAD__RETRY_ATTEMPTS=5`), then flags.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use woof_hosts::{BUZZHEAVIER, GOFILE, ProviderConfig};
use woof_uploader::OutputFormat;

pub const ENV_PREFIX: &str = "WOOF_";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Signed so that nonsense like `-3` reaches the engine's clamping instead
    /// of failing to parse.
    pub concurrency: i64,
    pub verbose: bool,
    pub output: OutputFormat,
    pub upload: UploadSettings,
    pub providers: Vec<ProviderConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadSettings {
    pub retry_attempts: u32,
    #[serde(with = "duration")]
    pub retry_delay: Duration,
    /// Request timeout for providers that don't configure their own.
    #[serde(with = "duration")]
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 5,
            verbose: false,
            output: OutputFormat::Text,
            upload: UploadSettings::default(),
            providers: vec![
                ProviderConfig::new(BUZZHEAVIER)
                    .with_setting("upload_url", woof_hosts::buzzheavier::DEFAULT_UPLOAD_URL)
                    .with_setting("download_base_url", woof_hosts::buzzheavier::DEFAULT_DOWNLOAD_BASE_URL)
                    .with_setting("timeout", "10m"),
                ProviderConfig::new(GOFILE)
                    .with_setting("upload_url", woof_hosts::gofile::DEFAULT_UPLOAD_URL)
                    .with_setting("timeout", "10m"),
            ],
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl Config {
    /// Provider entries with `upload.timeout` filled in where an entry has no
    /// `timeout` of its own.
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        let timeout = format!("{}ms", self.upload.timeout.as_millis());
        self.providers
            .iter()
            .cloned()
            .map(|mut config| {
                config.settings.entry("timeout".to_string()).or_insert_with(|| timeout.clone().into());
                config
            })
            .collect()
    }
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<i64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub verbose: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputFormat>,
    pub upload: UploadOverrides,
}

#[derive(Debug, Default, Serialize)]
pub struct UploadOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "duration::serialize_option")]
    pub retry_delay: Option<Duration>,
}

fn figment(file: Option<&Path>, overrides: &Overrides) -> Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(file) = file {
        if !file.is_file() {
            exn::bail!(ErrorKind::ConfigNotFound(file.to_path_buf()));
        }
        figment = figment.merge(Yaml::file(file));
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")).merge(Serialized::defaults(overrides)))
}

pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Config> {
    let config: Config = figment(file, overrides)?.extract().or_raise(|| ErrorKind::Config)?;
    tracing::debug!(
        source = %file.map_or_else(|| "defaults and environment".to_string(), |f| f.display().to_string()),
        concurrency = config.concurrency,
        verbose = config.verbose,
        output = %config.output,
        providers = config.providers.len(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Durations as `500ms`/`2s`/`10m`/`1h` strings or bare numbers of seconds.
mod duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}ms", value.as_millis()))
    }

    pub fn serialize_option<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(seconds) => Duration::try_from_secs_f64(seconds).map_err(serde::de::Error::custom),
            Raw::Text(text) => woof_hosts::parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }
}
