//! Registry of configured platform adapters.
//!
//! Built once at startup from the app config; platforms without app
//! credentials are simply absent and every lookup for them reports
//! [`AdapterError::NotConfigured`].

use std::collections::BTreeMap;
use std::sync::Arc;

use podlink_core::{AppConfig, Platform};

use crate::adapter::PlatformAdapter;
use crate::catalog::spec_for;
use crate::error::AdapterError;
use crate::rest::RestAdapter;

pub struct AdapterRegistry {
    adapters: BTreeMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    /// Builds adapters for every platform with configured app credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, AdapterError> {
        let mut adapters: BTreeMap<Platform, Arc<dyn PlatformAdapter>> = BTreeMap::new();
        for (platform, creds) in &config.platform_credentials {
            let adapter =
                RestAdapter::new(spec_for(*platform), creds.clone(), config.http_timeout_secs)?;
            adapters.insert(*platform, Arc::new(adapter));
        }
        Ok(Self { adapters })
    }

    /// An empty registry, for tests that insert their own adapters.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            adapters: BTreeMap::new(),
        }
    }

    /// Registers (or replaces) the adapter for a platform.
    pub fn insert(&mut self, platform: Platform, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(platform, adapter);
    }

    /// The adapter for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotConfigured`] when the platform has no
    /// configured app credentials.
    pub fn get(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>, AdapterError> {
        self.adapters
            .get(&platform)
            .cloned()
            .ok_or(AdapterError::NotConfigured {
                platform: platform.as_str(),
            })
    }

    /// Platforms with a configured adapter, in stable order.
    #[must_use]
    pub fn configured_platforms(&self) -> Vec<Platform> {
        self.adapters.keys().copied().collect()
    }
}
