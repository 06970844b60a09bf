//! Lazily-initialized store handle
//!
//! One handle serves the whole process: the provider chain opens on the
//! first `acquire()` and is reused until shutdown. The handle is
//! explicitly owned and injected rather than hidden in a global, so
//! tests can substitute fake stores.

use crate::config::{Properties, ScopeConfig};
use crate::error::ScopeResult;
use crate::registry::FactoryRegistry;
use crate::store::provider::{CacheManager, CacheOptions, CacheProvider, StoreCache, StoreUri};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{info, warn};

struct StoreChain {
    manager: Arc<dyn CacheManager>,
    cache: Arc<dyn StoreCache>,
}

/// Process-scoped client chain to the distributed store
pub struct StoreHandle {
    config: ScopeConfig,
    properties: Properties,
    provider: Arc<dyn CacheProvider>,
    registry: FactoryRegistry,
    chain: OnceCell<StoreChain>,
}

impl StoreHandle {
    /// Create an unopened handle
    pub fn new(
        config: ScopeConfig,
        provider: Arc<dyn CacheProvider>,
        registry: FactoryRegistry,
    ) -> Self {
        Self {
            config,
            properties: Properties::new(),
            provider,
            registry,
            chain: OnceCell::new(),
        }
    }

    /// Attach the raw property map forwarded to the provider at open
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// The resolved configuration this handle was built with
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Whether the provider chain has been opened
    pub fn is_open(&self) -> bool {
        self.chain.get().is_some()
    }

    /// Shared cache client, opening the provider chain on first call
    ///
    /// Concurrent first callers construct the chain exactly once; reads
    /// after publication take no lock. A failed initialization leaves
    /// the handle unopened, so a later call retries.
    pub fn acquire(&self) -> ScopeResult<Arc<dyn StoreCache>> {
        let chain = self.chain.get_or_try_init(|| self.open_chain())?;
        Ok(Arc::clone(&chain.cache))
    }

    fn open_chain(&self) -> ScopeResult<StoreChain> {
        let store = &self.config.store;

        let uri = match &store.uri {
            Some(raw) => StoreUri::parse(raw)?,
            None => self.provider.default_uri(),
        };

        let mut options = CacheOptions {
            read_through: store.read_through,
            write_through: store.write_through,
            management_enabled: store.management_enabled,
            statistics_enabled: store.statistics_enabled,
            store_by_value: store.store_by_value,
            ..CacheOptions::default()
        };
        if let Some(name) = &store.loader_factory {
            options.loader = Some(self.registry.loader(name)?);
        }
        if let Some(name) = &store.writer_factory {
            options.writer = Some(self.registry.writer(name)?);
        }
        if let Some(name) = &store.expiry_factory {
            options.expiry = Some(self.registry.expiry(name)?);
        }

        let manager = self.provider.open_manager(&uri, &self.properties)?;
        let cache = manager.create_cache(&store.name, options)?;

        info!(uri = %uri, cache = %store.name, "Opened distributed scope store");
        Ok(StoreChain { manager, cache })
    }

    /// Close cache, manager, and provider in order
    ///
    /// Each close is best-effort: a failure is logged and swallowed so
    /// the remaining resources still get their close attempt. A handle
    /// that never opened has nothing to close.
    pub(crate) fn close_chain(&self) {
        let Some(chain) = self.chain.get() else {
            return;
        };

        if let Err(e) = chain.cache.close() {
            warn!("Failed to close scope cache: {}", e);
        }
        if let Err(e) = chain.manager.close() {
            warn!("Failed to close store manager: {}", e);
        }
        if let Err(e) = self.provider.close() {
            warn!("Failed to close store provider: {}", e);
        }
    }
}
