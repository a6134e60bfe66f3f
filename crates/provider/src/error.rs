//! Provider Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Unlike the other crates in the
//! workspace, the payload is a struct rather than a bare kind enum: hosting
//! services hand back their own error codes and messages, and callers need
//! both alongside the [`ErrorKind`] that drives retry decisions.

use derive_more::{Display, Error};
use serde::Serialize;
use std::fmt;

/// A provider error with automatic location tracking.
pub type Error = exn::Exn<ProviderError>;
/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Substrings that mark an otherwise unclassified error as transient.
const RETRYABLE_HINTS: [&str; 3] = ["connection", "timeout", "temporary"];

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Not classified by the adapter that produced it.
    #[display("unknown")]
    Unknown,
    /// Connectivity problems: DNS, refused connections, resets, timeouts.
    #[display("network")]
    Network,
    /// The hosting service rejected the request or answered with garbage.
    #[display("api")]
    Api,
    /// Credentials missing, invalid or insufficient.
    #[display("authentication")]
    Authentication,
    /// Rate limited or over quota; waiting may help.
    #[display("quota")]
    Quota,
    /// File exceeds what the hosting service accepts.
    #[display("file too large")]
    FileTooLarge,
    /// File type or format not accepted by the hosting service.
    #[display("unsupported")]
    Unsupported,
    /// Transient failure on the provider side.
    #[display("temporary")]
    Temporary,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Quota | Self::Temporary)
    }
}

/// Cause recorded beneath the error of an upload stopped by its cancellation
/// token.
#[derive(Clone, Copy, Debug, Display, Error, PartialEq, Eq)]
#[display("cancellation requested")]
pub struct Cancelled;

/// A retryable [`ErrorKind::Temporary`] error raised over [`Cancelled`].
#[track_caller]
pub fn cancelled(message: impl Into<String>) -> Error {
    exn::Exn::new(Cancelled).raise(ProviderError::temporary(message))
}

/// Normalized failure of a single provider operation.
///
/// The `retryable` flag is derived from the [`ErrorKind`] when the error is
/// constructed and never changes afterwards. The underlying cause (if any)
/// lives in the surrounding [`exn::Exn`] error tree rather than in the struct.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub struct ProviderError {
    kind: ErrorKind,
    code: Option<String>,
    message: String,
    retryable: bool,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            retryable: kind.is_retryable(),
        }
    }

    /// Attach the provider-specific error code (HTTP status, API error name).
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        self.code = (!code.is_empty()).then_some(code);
        self
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message).with_code(code)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Quota, message)
    }

    pub fn file_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FileTooLarge, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    pub fn temporary(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Temporary, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The retryable flag fixed at construction time.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Whether another attempt is worth making.
    ///
    /// Classified errors answer by kind alone. Only [`ErrorKind::Unknown`]
    /// falls back to sniffing the message for hints of a transient failure.
    pub fn should_retry(&self) -> bool {
        match self.kind {
            ErrorKind::Unknown => {
                let text = self.to_string().to_lowercase();
                RETRYABLE_HINTS.iter().any(|hint| text.contains(hint))
            },
            kind => kind.is_retryable(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code: {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Unknown, false)]
    #[case(ErrorKind::Network, true)]
    #[case(ErrorKind::Api, false)]
    #[case(ErrorKind::Authentication, false)]
    #[case(ErrorKind::Quota, true)]
    #[case(ErrorKind::FileTooLarge, false)]
    #[case(ErrorKind::Unsupported, false)]
    #[case(ErrorKind::Temporary, true)]
    fn test_retryable_follows_kind(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
        assert_eq!(ProviderError::new(kind, "boom").is_retryable(), expected);
    }

    #[rstest]
    #[case("Connection reset by peer", true)]
    #[case("request TIMEOUT", true)]
    #[case("temporary glitch", true)]
    #[case("no idea what happened", false)]
    fn test_unknown_falls_back_to_message(#[case] message: &str, #[case] expected: bool) {
        assert_eq!(ProviderError::unknown(message).should_retry(), expected);
    }

    #[test]
    fn test_classified_kind_ignores_message() {
        // An API error talking about timeouts is still an API error.
        assert!(!ProviderError::api("504", "gateway timeout").should_retry());
        assert!(ProviderError::quota("slow down").should_retry());
    }

    #[test]
    fn test_display_includes_code() {
        assert_eq!(ProviderError::api("MISSING_URL", "no url").to_string(), "no url (code: MISSING_URL)");
        assert_eq!(ProviderError::network("offline").to_string(), "offline");
        assert_eq!(ProviderError::api("", "empty code").code(), None);
    }

    #[test]
    fn test_cancelled_records_cause() {
        let err = cancelled("upload cancelled");
        assert_eq!(err.kind(), ErrorKind::Temporary);
        assert!(err.should_retry());
        let causes = err.frame().children();
        assert_eq!(causes.len(), 1);
        assert!(causes[0].error().is::<Cancelled>());
    }

    #[test]
    fn test_error_from_result() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
        let err: Result<()> = result.or_raise(|| ProviderError::network("failed to read file"));
        let exn = err.unwrap_err();
        // Exn<E> implements Deref<Target = E>
        assert_eq!(exn.kind(), ErrorKind::Network);
        assert_eq!(exn.message(), "failed to read file");
    }
}
