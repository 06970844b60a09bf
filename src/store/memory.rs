//! In-process store provider
//!
//! Reference implementation of the provider chain for tests and
//! single-node embedding. Storage is shared per (endpoint, cache name)
//! across every manager opened from the same provider, so two handles
//! opened against the same endpoint observe each other's entries the
//! way two cluster nodes would.

use crate::config::Properties;
use crate::error::{ScopeError, ScopeResult};
use crate::key::ComponentKey;
use crate::record::InstanceRecord;
use crate::store::provider::{
    CacheManager, CacheOptions, CacheProvider, CacheStats, StoreCache, StoreUri,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// URI scheme served by this provider
pub const MEMORY_SCHEME: &str = "memory";

type SharedEntries = Arc<Mutex<HashMap<String, StoredEntry>>>;

struct StoredEntry {
    record: InstanceRecord,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

struct ProviderState {
    storage: Mutex<HashMap<(String, String), SharedEntries>>,
    closed: AtomicBool,
}

/// In-process cache provider
///
/// Cheap to clone; clones share the same storage.
#[derive(Clone)]
pub struct MemoryProvider {
    state: Arc<ProviderState>,
}

impl MemoryProvider {
    /// Create a provider with no open endpoints
    pub fn new() -> Self {
        Self {
            state: Arc::new(ProviderState {
                storage: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheProvider for MemoryProvider {
    fn default_uri(&self) -> StoreUri {
        StoreUri::parse("memory:default").expect("default memory URI is well-formed")
    }

    fn open_manager(
        &self,
        uri: &StoreUri,
        _properties: &Properties,
    ) -> ScopeResult<Arc<dyn CacheManager>> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(ScopeError::StoreClosed("memory provider".to_string()));
        }
        if uri.scheme() != MEMORY_SCHEME {
            return Err(ScopeError::ManagerOpen {
                uri: uri.to_string(),
                reason: format!("memory provider cannot serve scheme {:?}", uri.scheme()),
            });
        }

        debug!("Opened memory store manager for {}", uri);
        Ok(Arc::new(MemoryManager {
            state: Arc::clone(&self.state),
            endpoint: uri.endpoint().to_string(),
            closed: AtomicBool::new(false),
        }))
    }

    fn close(&self) -> ScopeResult<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        lock(&self.state.storage).clear();
        Ok(())
    }
}

struct MemoryManager {
    state: Arc<ProviderState>,
    endpoint: String,
    closed: AtomicBool,
}

impl CacheManager for MemoryManager {
    fn create_cache(&self, name: &str, options: CacheOptions) -> ScopeResult<Arc<dyn StoreCache>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ScopeError::CacheCreate {
                name: name.to_string(),
                reason: "manager is closed".to_string(),
            });
        }

        let entries = lock(&self.state.storage)
            .entry((self.endpoint.clone(), name.to_string()))
            .or_default()
            .clone();

        debug!(
            cache = name,
            endpoint = %self.endpoint,
            store_by_value = options.store_by_value,
            read_through = options.read_through,
            write_through = options.write_through,
            management_enabled = options.management_enabled,
            statistics_enabled = options.statistics_enabled,
            "Created memory cache"
        );

        Ok(Arc::new(MemoryCache {
            name: name.to_string(),
            entries,
            options,
            closed: AtomicBool::new(false),
            gets: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            puts: AtomicU64::new(0),
        }))
    }

    fn close(&self) -> ScopeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryCache {
    name: String,
    entries: SharedEntries,
    options: CacheOptions,
    closed: AtomicBool,
    gets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
}

impl MemoryCache {
    fn ensure_open(&self) -> ScopeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ScopeError::StoreClosed(self.name.clone()));
        }
        Ok(())
    }

    /// Copy crossing the store boundary: detached under store-by-value,
    /// shared otherwise
    fn boundary_copy(&self, record: &InstanceRecord) -> InstanceRecord {
        if self.options.store_by_value {
            record.deep_clone()
        } else {
            record.clone()
        }
    }

    fn make_entry(&self, record: &InstanceRecord) -> StoredEntry {
        StoredEntry {
            record: self.boundary_copy(record),
            expires_at: self
                .options
                .expiry
                .as_ref()
                .and_then(|expiry| expiry.time_to_live())
                .map(|ttl| Utc::now() + ttl),
        }
    }

    /// Propagate to the writer before touching storage, so a writer
    /// failure leaves the entry unchanged
    fn write_through(&self, key: &ComponentKey, record: &InstanceRecord) -> ScopeResult<()> {
        if self.options.write_through {
            if let Some(writer) = &self.options.writer {
                writer.write(key, record)?;
            }
        }
        Ok(())
    }

    fn take_live(
        &self,
        map: &mut MutexGuard<'_, HashMap<String, StoredEntry>>,
        key: &ComponentKey,
    ) -> Option<InstanceRecord> {
        let now = Utc::now();
        match map.get(key.as_str()) {
            Some(entry) if entry.is_expired(now) => {
                map.remove(key.as_str());
                None
            }
            Some(entry) => Some(self.boundary_copy(&entry.record)),
            None => None,
        }
    }
}

impl StoreCache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &ComponentKey) -> ScopeResult<Option<InstanceRecord>> {
        self.ensure_open()?;
        self.gets.fetch_add(1, Ordering::SeqCst);

        {
            let mut map = lock(&self.entries);
            if let Some(record) = self.take_live(&mut map, key) {
                self.hits.fetch_add(1, Ordering::SeqCst);
                return Ok(Some(record));
            }
        }
        self.misses.fetch_add(1, Ordering::SeqCst);

        // Read-through: consult the loader outside the map lock. Two
        // concurrent misses may both load; last insert wins.
        if self.options.read_through {
            if let Some(loader) = &self.options.loader {
                if let Some(loaded) = loader.load(key)? {
                    let entry = self.make_entry(&loaded);
                    lock(&self.entries).insert(key.as_str().to_string(), entry);
                    debug!(key = %key, cache = %self.name, "Loaded entry read-through");
                    return Ok(Some(loaded));
                }
            }
        }

        Ok(None)
    }

    fn get_and_put(
        &self,
        key: &ComponentKey,
        record: InstanceRecord,
    ) -> ScopeResult<Option<InstanceRecord>> {
        self.ensure_open()?;
        self.write_through(key, &record)?;
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.puts.fetch_add(1, Ordering::SeqCst);

        let entry = self.make_entry(&record);
        let mut map = lock(&self.entries);
        let previous = self.take_live(&mut map, key);
        map.insert(key.as_str().to_string(), entry);
        Ok(previous)
    }

    fn put(&self, key: &ComponentKey, record: InstanceRecord) -> ScopeResult<()> {
        self.ensure_open()?;
        self.write_through(key, &record)?;
        self.puts.fetch_add(1, Ordering::SeqCst);

        let entry = self.make_entry(&record);
        lock(&self.entries).insert(key.as_str().to_string(), entry);
        Ok(())
    }

    fn entries(&self) -> ScopeResult<Vec<(ComponentKey, InstanceRecord)>> {
        self.ensure_open()?;
        let now = Utc::now();
        let mut map = lock(&self.entries);
        map.retain(|_, entry| !entry.is_expired(now));
        Ok(map
            .iter()
            .map(|(key, entry)| {
                (
                    ComponentKey::new(key.clone()),
                    self.boundary_copy(&entry.record),
                )
            })
            .collect())
    }

    fn statistics(&self) -> Option<CacheStats> {
        if !self.options.statistics_enabled {
            return None;
        }
        Some(CacheStats {
            gets: self.gets.load(Ordering::SeqCst),
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
            puts: self.puts.load(Ordering::SeqCst),
        })
    }

    fn close(&self) -> ScopeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
