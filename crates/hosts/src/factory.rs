use crate::buzzheavier::BuzzHeavier;
use crate::error::{ErrorKind, Result};
use crate::gofile::GoFile;
use crate::settings::ProviderConfig;
use std::sync::Arc;
use woof_provider::observer::ObserverHandle;
use woof_provider::{ConsistencyWrapper, ProviderHandle, WrapperConfig};

pub const BUZZHEAVIER: &str = "buzzheavier";
pub const GOFILE: &str = "gofile";
/// Every provider name the factory can build, in `--all` order.
pub const KNOWN_PROVIDERS: [&str; 2] = [BUZZHEAVIER, GOFILE];

/// Builds adapters by name and wraps each in a [`ConsistencyWrapper`].
#[derive(Clone)]
pub struct Factory {
    wrapper: WrapperConfig,
    observer: Option<ObserverHandle>,
}

impl Factory {
    pub fn new(wrapper: WrapperConfig) -> Self {
        Self { wrapper, observer: None }
    }

    /// Observer handed to every wrapper built from now on.
    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the provider named by `config.name` (case-insensitive).
    pub fn create(&self, config: &ProviderConfig) -> Result<ProviderHandle> {
        tracing::debug!(provider = %config.name, settings = config.settings.len(), "Creating provider");
        let provider: ProviderHandle = match config.name.trim().to_ascii_lowercase().as_str() {
            BUZZHEAVIER => Arc::new(BuzzHeavier::new(config)?),
            GOFILE => Arc::new(GoFile::new(config)?),
            _ => exn::bail!(ErrorKind::UnknownProviders(vec![config.name.clone()])),
        };
        Ok(self.wrap(provider))
    }

    /// Build every enabled entry, in configuration order.
    pub fn create_enabled(&self, configs: &[ProviderConfig]) -> Result<Vec<ProviderHandle>> {
        configs
            .iter()
            .filter(|config| {
                if !config.enabled {
                    tracing::debug!(provider = %config.name, "Skipping disabled provider");
                }
                config.enabled
            })
            .map(|config| self.create(config))
            .collect()
    }

    /// Build the named providers in the order given, whether enabled or not.
    ///
    /// Settings come from the matching entry in `configs` when there is one;
    /// names without an entry get defaults. Every unknown name is reported in
    /// a single error before anything is built.
    pub fn create_named<S: AsRef<str>>(&self, names: &[S], configs: &[ProviderConfig]) -> Result<Vec<ProviderHandle>> {
        let mut wanted: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim().to_ascii_lowercase();
            if !name.is_empty() && !wanted.contains(&name) {
                wanted.push(name);
            }
        }
        let unknown: Vec<String> =
            wanted.iter().filter(|name| !KNOWN_PROVIDERS.contains(&name.as_str())).cloned().collect();
        if !unknown.is_empty() {
            exn::bail!(ErrorKind::UnknownProviders(unknown));
        }

        wanted
            .iter()
            .map(|name| match configs.iter().find(|config| config.name.trim().eq_ignore_ascii_case(name)) {
                Some(config) => self.create(config),
                None => self.create(&ProviderConfig::new(name.as_str())),
            })
            .collect()
    }

    /// Build every known provider with default settings.
    pub fn create_all(&self) -> Result<Vec<ProviderHandle>> {
        KNOWN_PROVIDERS.iter().map(|name| self.create(&ProviderConfig::new(*name))).collect()
    }

    fn wrap(&self, provider: ProviderHandle) -> ProviderHandle {
        let wrapper = ConsistencyWrapper::new(provider, self.wrapper.clone());
        match &self.observer {
            Some(observer) => Arc::new(wrapper.with_observer(Arc::clone(observer))),
            None => Arc::new(wrapper),
        }
    }
}
