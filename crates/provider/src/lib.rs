//! Provider contract and consistency layer.
//!
//! Hosting services all speak their own dialect: different status codes,
//! different response shapes, different ideas about what "too large" means.
//! This crate gives the upload engine one vocabulary for all of them:
//!
//! - [`Provider`]: the capability set every adapter implements,
//! - [`ProviderResponse`] and [`ProviderError`](error::ProviderError): the
//!   normalized success and failure shapes,
//! - [`ConsistencyWrapper`]: a decorator adding validation, retries with
//!   backoff and response normalization to any adapter.

pub mod error;
pub mod observer;
pub mod provider;
mod response;

pub use crate::provider::{ConsistencyWrapper, Provider, UploadBody, WrapperConfig};
pub use crate::response::ProviderResponse;
use std::sync::Arc;

pub type ProviderHandle = Arc<dyn Provider + Send + Sync>;
