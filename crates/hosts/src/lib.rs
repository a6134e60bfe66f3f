//! Adapters for the anonymous file hosting services woof can upload to.
//!
//! Each adapter implements [`woof_provider::Provider`] over `reqwest`,
//! streaming the upload body instead of buffering it. The [`Factory`] turns
//! [`ProviderConfig`] entries into ready-to-use, wrapped providers.
//!
//! # Examples
//!
//! ```no_run
//! use woof_hosts::{Factory, ProviderConfig};
//! use woof_provider::WrapperConfig;
//!
//! # fn main() -> woof_hosts::error::Result<()> {
//! let configs = vec![ProviderConfig::new("gofile").enabled(true)];
//! let providers = Factory::new(WrapperConfig::default()).create_enabled(&configs)?;
//! assert_eq!(providers.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod buzzheavier;
pub mod error;
mod factory;
pub mod gofile;
mod http;
mod settings;

pub use crate::buzzheavier::BuzzHeavier;
pub use crate::factory::{BUZZHEAVIER, Factory, GOFILE, KNOWN_PROVIDERS};
pub use crate::gofile::GoFile;
pub use crate::settings::{ProviderConfig, parse_duration};
