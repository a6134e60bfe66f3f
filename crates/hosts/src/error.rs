//! Host Construction Error Types
//!
//! Failures while *building* adapters. Failures of an upload itself are
//! [`ProviderError`](woof_provider::error::ProviderError)s.

use derive_more::{Display, Error};

/// A host construction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for host construction.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Requested provider names nobody implements.
    #[display("unknown providers: {}", _0.join(", "))]
    UnknownProviders(#[error(not(source))] Vec<String>),
    /// A provider setting has the wrong type or an unusable value.
    #[display("invalid setting `{key}` for provider {provider}")]
    InvalidSetting { provider: String, key: String },
    /// The HTTP client could not be constructed.
    #[display("failed to build HTTP client for provider {_0}")]
    Client(#[error(not(source))] String),
}
