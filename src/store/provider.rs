//! Distributed store abstraction
//!
//! Provides the provider → manager → cache trait chain the scope is
//! written against, so different store backends can be swapped in
//! without touching resolution logic.

use crate::config::Properties;
use crate::error::{ScopeError, ScopeResult};
use crate::key::ComponentKey;
use crate::record::InstanceRecord;
use crate::registry::{EntryLoader, EntryWriter, ExpiryPolicy};
use std::fmt;
use std::sync::Arc;

/// Parsed and validated store endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUri {
    scheme: String,
    endpoint: String,
}

impl StoreUri {
    /// Parse a `scheme:endpoint` URI
    pub fn parse(input: &str) -> ScopeResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ScopeError::uri(input, "empty URI"));
        }

        let (scheme, endpoint) = trimmed
            .split_once(':')
            .ok_or_else(|| ScopeError::uri(input, "missing scheme, expected scheme:endpoint"))?;

        let valid_scheme = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(ScopeError::uri(input, format!("invalid scheme {:?}", scheme)));
        }
        if endpoint.is_empty() {
            return Err(ScopeError::uri(input, "empty endpoint"));
        }

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            endpoint: endpoint.to_string(),
        })
    }

    /// URI scheme, lowercased
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Endpoint part after the scheme
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.endpoint)
    }
}

/// Cache construction options resolved from configuration
#[derive(Clone, Default)]
pub struct CacheOptions {
    /// Consult the loader on cache misses
    pub read_through: bool,

    /// Notify the writer on every put
    pub write_through: bool,

    /// Expose provider management hooks
    pub management_enabled: bool,

    /// Count store operations
    pub statistics_enabled: bool,

    /// Hold detached value-copies instead of shared references
    pub store_by_value: bool,

    /// Resolved entry loader, when read-through is configured
    pub loader: Option<Arc<dyn EntryLoader>>,

    /// Resolved entry writer, when write-through is configured
    pub writer: Option<Arc<dyn EntryWriter>>,

    /// Resolved expiry policy
    pub expiry: Option<Arc<dyn ExpiryPolicy>>,
}

/// Operation counters exposed when statistics are enabled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Point lookups served
    pub gets: u64,
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries written (puts and swaps)
    pub puts: u64,
}

/// Entry point to a distributed store implementation
pub trait CacheProvider: Send + Sync {
    /// Endpoint used when configuration does not name one
    fn default_uri(&self) -> StoreUri;

    /// Open the manager for an endpoint, forwarding the raw properties
    fn open_manager(
        &self,
        uri: &StoreUri,
        properties: &Properties,
    ) -> ScopeResult<Arc<dyn CacheManager>>;

    /// Close the provider and any resources it still holds
    fn close(&self) -> ScopeResult<()>;
}

/// Manages the caches living under one store endpoint
pub trait CacheManager: Send + Sync {
    /// Create (or connect to) the named cache
    fn create_cache(&self, name: &str, options: CacheOptions) -> ScopeResult<Arc<dyn StoreCache>>;

    /// Close the manager
    fn close(&self) -> ScopeResult<()>;
}

/// A named key-value namespace in the distributed store
///
/// `get_and_put` is the single cross-node ordering primitive; every
/// other operation is last-write-wins.
pub trait StoreCache: Send + Sync {
    /// Cache name
    fn name(&self) -> &str;

    /// Point lookup
    fn get(&self, key: &ComponentKey) -> ScopeResult<Option<InstanceRecord>>;

    /// Atomic swap: store the record and return the previous entry
    fn get_and_put(
        &self,
        key: &ComponentKey,
        record: InstanceRecord,
    ) -> ScopeResult<Option<InstanceRecord>>;

    /// Unconditional put
    fn put(&self, key: &ComponentKey, record: InstanceRecord) -> ScopeResult<()>;

    /// Snapshot of all live entries
    fn entries(&self) -> ScopeResult<Vec<(ComponentKey, InstanceRecord)>>;

    /// Operation counters; `None` unless statistics are enabled
    fn statistics(&self) -> Option<CacheStats> {
        None
    }

    /// Close the cache
    fn close(&self) -> ScopeResult<()>;
}

impl fmt::Debug for dyn CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CacheManager")
    }
}

impl fmt::Debug for dyn StoreCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreCache({})", self.name())
    }
}
