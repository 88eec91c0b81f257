//! Builder for configuring a ServiceLocator.

use crate::cache::{MemoryServiceCache, ServiceCache};
use crate::config::ServiceCacheConfig;
use crate::directory::{DirectoryConnector, DirectoryLookup};
use crate::error::{LocatorError, Result};
use crate::locator::ServiceLocator;
use crate::oracle::{LocalInterfaceOracle, ProcessOracle};
use std::sync::Arc;

/// Builder for [`ServiceLocator`].
///
/// A lookup provider and a connector are required. The cache defaults to an
/// unbounded [`MemoryServiceCache`] and the oracle to
/// [`LocalInterfaceOracle`].
#[derive(Default)]
pub struct ServiceLocatorBuilder {
    lookup: Option<Arc<dyn DirectoryLookup>>,
    connector: Option<Arc<dyn DirectoryConnector>>,
    cache: Option<Arc<dyn ServiceCache>>,
    cache_config: ServiceCacheConfig,
    oracle: Option<Arc<dyn ProcessOracle>>,
}

impl ServiceLocatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where to find the directory's published descriptor.
    pub fn lookup(mut self, lookup: impl DirectoryLookup + 'static) -> Self {
        self.lookup = Some(Arc::new(lookup));
        self
    }

    pub fn shared_lookup(mut self, lookup: Arc<dyn DirectoryLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Transport used to connect to the directory.
    pub fn connector(mut self, connector: impl DirectoryConnector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn shared_connector(mut self, connector: Arc<dyn DirectoryConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Use a caller-provided cache. Overrides [`cache_config`](Self::cache_config).
    pub fn cache(mut self, cache: Arc<dyn ServiceCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Options for the default in-memory cache.
    ///
    /// Default: unbounded, no idle expiry
    pub fn cache_config(mut self, config: ServiceCacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn oracle(mut self, oracle: impl ProcessOracle + 'static) -> Self {
        self.oracle = Some(Arc::new(oracle));
        self
    }

    /// Build the locator. No connection is attempted until first use.
    pub fn build(self) -> Result<ServiceLocator> {
        let lookup = self.lookup.ok_or_else(|| LocatorError::Config {
            message: "A directory lookup provider is required".to_string(),
        })?;
        let connector = self.connector.ok_or_else(|| LocatorError::Config {
            message: "A directory connector is required".to_string(),
        })?;
        let cache = match self.cache {
            Some(cache) => cache,
            None => Arc::new(MemoryServiceCache::with_config(&self.cache_config)),
        };
        let oracle = self
            .oracle
            .unwrap_or_else(|| Arc::new(LocalInterfaceOracle));

        Ok(ServiceLocator::from_parts(lookup, connector, cache, oracle))
    }
}
