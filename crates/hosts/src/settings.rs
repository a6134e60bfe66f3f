use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// One entry of the `providers` configuration list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    /// Adapter-specific settings; unknown keys are ignored.
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Non-empty string setting.
    pub(crate) fn string(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Duration setting; an unparsable value falls back to `default`.
    pub(crate) fn duration(&self, key: &str, default: Duration) -> Duration {
        let parsed = match self.settings.get(key) {
            None | Some(Value::Null) => return default,
            Some(Value::Number(seconds)) => seconds.as_f64().and_then(|s| Duration::try_from_secs_f64(s).ok()),
            Some(Value::String(text)) => parse_duration(text).ok(),
            Some(_) => None,
        };
        parsed.unwrap_or_else(|| {
            tracing::warn!(provider = %self.name, key, value = %self.settings[key], ?default, "Invalid duration setting, using default");
            default
        })
    }

    /// Byte count setting, given as a number or a numeric string.
    pub(crate) fn bytes(&self, key: &str) -> Result<Option<u64>> {
        let value = match self.settings.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Number(number)) => number.as_u64(),
            Some(Value::String(text)) => text.trim().parse().ok(),
            Some(_) => None,
        };
        match value {
            Some(value) => Ok(Some(value)),
            None => exn::bail!(ErrorKind::InvalidSetting { provider: self.name.clone(), key: key.to_string() }),
        }
    }
}

/// Parse durations such as `500ms`, `2s`, `10m`, `1h`, `1h30m` or a bare
/// number of seconds.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let text = input.trim();
    let invalid = || format!("invalid duration `{input}` (expected e.g. 500ms, 2s, 10m, 1h)");
    if text.is_empty() {
        return Err(invalid());
    }
    if let Ok(seconds) = text.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).map_err(|_| invalid());
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let split = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        let value: f64 = rest[..split].parse().map_err(|_| invalid())?;
        rest = &rest[split..];
        let split = rest.find(is_number).unwrap_or(rest.len());
        let scale = match &rest[..split] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        rest = &rest[split..];
        total += Duration::try_from_secs_f64(value * scale).map_err(|_| invalid())?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("500ms", Duration::from_millis(500))]
    #[case("2s", Duration::from_secs(2))]
    #[case("10m", Duration::from_secs(600))]
    #[case("1h", Duration::from_secs(3600))]
    #[case("1h30m", Duration::from_secs(5400))]
    #[case("1.5s", Duration::from_millis(1500))]
    #[case("3", Duration::from_secs(3))]
    #[case(" 0 ", Duration::ZERO)]
    fn test_parse_duration(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(input), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("soon")]
    #[case("5 minutes")]
    #[case("10d")]
    #[case("-1")]
    #[case("ms")]
    fn test_parse_duration_rejects(#[case] input: &str) {
        assert!(parse_duration(input).is_err());
    }

    #[test]
    fn test_settings_accessors() {
        let config = ProviderConfig::new("buzzheavier")
            .with_setting("upload_url", "https://up.example.com")
            .with_setting("blank", "  ")
            .with_setting("timeout", "5m")
            .with_setting("bad_timeout", "whenever")
            .with_setting("numeric_timeout", 30)
            .with_setting("max_file_size", 1024)
            .with_setting("max_as_text", "2048")
            .with_setting("max_bogus", "lots");

        assert_eq!(config.string("upload_url"), Some("https://up.example.com"));
        assert_eq!(config.string("blank"), None);
        assert_eq!(config.string("missing"), None);
        let default = Duration::from_secs(600);
        assert_eq!(config.duration("timeout", default), Duration::from_secs(300));
        assert_eq!(config.duration("bad_timeout", default), default);
        assert_eq!(config.duration("numeric_timeout", default), Duration::from_secs(30));
        assert_eq!(config.duration("missing", default), default);
        assert_eq!(config.bytes("max_file_size").unwrap(), Some(1024));
        assert_eq!(config.bytes("max_as_text").unwrap(), Some(2048));
        assert_eq!(config.bytes("missing").unwrap(), None);
        assert!(config.bytes("max_bogus").is_err());
    }
}
