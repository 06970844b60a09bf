//! Pluggable factory registry
//!
//! Replaces class-name-based factory loading: configuration strings
//! map to factory constructors registered at startup, resolved once
//! when the store handle opens.

use crate::error::{ScopeError, ScopeResult};
use crate::key::ComponentKey;
use crate::record::InstanceRecord;
use chrono::Duration;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Loads entries from an external backing system on cache miss
pub trait EntryLoader: Send + Sync {
    /// Load the record for a key, or `None` if the backing system has none
    fn load(&self, key: &ComponentKey) -> ScopeResult<Option<InstanceRecord>>;
}

/// Observes entry writes for write-through propagation
pub trait EntryWriter: Send + Sync {
    /// Propagate a written entry to the backing system
    fn write(&self, key: &ComponentKey, record: &InstanceRecord) -> ScopeResult<()>;
}

impl fmt::Debug for dyn EntryWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EntryWriter")
    }
}

/// Supplies entry lifetimes for the cache
pub trait ExpiryPolicy: Send + Sync {
    /// Time entries stay live after a write; `None` = never expire
    fn time_to_live(&self) -> Option<Duration>;
}

type LoaderFactory = Arc<dyn Fn() -> Arc<dyn EntryLoader> + Send + Sync>;
type WriterFactory = Arc<dyn Fn() -> Arc<dyn EntryWriter> + Send + Sync>;
type ExpiryFactory = Arc<dyn Fn() -> Arc<dyn ExpiryPolicy> + Send + Sync>;

/// Name-keyed factory constructors for the pluggable cache seams
#[derive(Default, Clone)]
pub struct FactoryRegistry {
    loaders: HashMap<String, LoaderFactory>,
    writers: HashMap<String, WriterFactory>,
    expiries: HashMap<String, ExpiryFactory>,
}

impl FactoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry loader factory under a configuration name
    pub fn register_loader(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Arc<dyn EntryLoader> + Send + Sync + 'static,
    ) {
        self.loaders.insert(name.into(), Arc::new(factory));
    }

    /// Register an entry writer factory under a configuration name
    pub fn register_writer(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Arc<dyn EntryWriter> + Send + Sync + 'static,
    ) {
        self.writers.insert(name.into(), Arc::new(factory));
    }

    /// Register an expiry policy factory under a configuration name
    pub fn register_expiry(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Arc<dyn ExpiryPolicy> + Send + Sync + 'static,
    ) {
        self.expiries.insert(name.into(), Arc::new(factory));
    }

    /// Construct the loader registered under `name`
    pub fn loader(&self, name: &str) -> ScopeResult<Arc<dyn EntryLoader>> {
        self.loaders
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ScopeError::UnknownFactory {
                kind: "loader",
                name: name.to_string(),
            })
    }

    /// Construct the writer registered under `name`
    pub fn writer(&self, name: &str) -> ScopeResult<Arc<dyn EntryWriter>> {
        self.writers
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ScopeError::UnknownFactory {
                kind: "writer",
                name: name.to_string(),
            })
    }

    /// Construct the expiry policy registered under `name`
    pub fn expiry(&self, name: &str) -> ScopeResult<Arc<dyn ExpiryPolicy>> {
        self.expiries
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ScopeError::UnknownFactory {
                kind: "expiry",
                name: name.to_string(),
            })
    }
}
