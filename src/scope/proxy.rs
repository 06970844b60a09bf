//! Write-back interception
//!
//! Wraps a resolved record so every dispatched call re-persists the
//! record into the store. The store may hold a value-copy of the
//! entry, so a local mutation is invisible to other cluster members
//! until it is written back; persisting after every call keeps the
//! cluster in sync without the caller's cooperation.

use crate::error::{ScopeError, ScopeResult};
use crate::key::ComponentKey;
use crate::record::InstanceRecord;
use crate::store::provider::StoreCache;
use serde::{Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Transparent wrapper around a resolved instance
///
/// Created fresh on every resolution and discarded when the call chain
/// returns; only the wrapped record is ever persisted, never the proxy.
pub struct ScopeProxy {
    key: ComponentKey,
    record: InstanceRecord,
    cache: Arc<dyn StoreCache>,
}

impl fmt::Debug for ScopeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeProxy")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl ScopeProxy {
    pub(crate) fn new(key: ComponentKey, record: InstanceRecord, cache: Arc<dyn StoreCache>) -> Self {
        Self { key, record, cache }
    }

    /// Component key this proxy resolves
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    /// The wrapped record
    pub fn record(&self) -> &InstanceRecord {
        &self.record
    }

    /// Dispatch a call against the wrapped instance
    ///
    /// Exactly one write-back of the record runs on every exit path:
    /// normal return, dispatch error, or panic. On the non-panic path
    /// the write-back executes in-line and a store failure propagates;
    /// on unwind it is best-effort and logged. The closure's own result
    /// passes through untouched.
    pub fn invoke<R>(&self, f: impl FnOnce(&mut dyn Any) -> R) -> ScopeResult<R> {
        let guard = WriteBack::arm(&self.key, &self.record, &self.cache);
        let out = self.record.with_value(|instance| match instance {
            Some(instance) => Ok(f(instance.as_any_mut())),
            None => Err(ScopeError::InstanceMissing {
                key: self.key.to_string(),
            }),
        });
        guard.complete()?;
        out
    }

    /// Typed dispatch against the wrapped instance
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> ScopeResult<R> {
        self.invoke(|any| any.downcast_mut::<T>().map(f))?
            .ok_or_else(|| ScopeError::InstanceType {
                key: self.key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Pass-through data transfer
    ///
    /// Serializes the wrapped instance directly, with no write-back:
    /// transferring state is not a business mutation and must not
    /// trigger redundant store writes.
    pub fn transfer(&self) -> ScopeResult<serde_json::Value> {
        self.record
            .snapshot()?
            .ok_or_else(|| ScopeError::InstanceMissing {
                key: self.key.to_string(),
            })
    }
}

impl Serialize for ScopeProxy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.transfer().map_err(serde::ser::Error::custom)?;
        value.serialize(serializer)
    }
}

/// Scoped write-back that fires exactly once on every exit path
struct WriteBack<'a> {
    key: &'a ComponentKey,
    record: &'a InstanceRecord,
    cache: &'a Arc<dyn StoreCache>,
    armed: bool,
}

impl<'a> WriteBack<'a> {
    fn arm(key: &'a ComponentKey, record: &'a InstanceRecord, cache: &'a Arc<dyn StoreCache>) -> Self {
        Self {
            key,
            record,
            cache,
            armed: true,
        }
    }

    /// In-line write-back on the non-unwind path, so store failures
    /// reach the caller
    fn complete(mut self) -> ScopeResult<()> {
        self.armed = false;
        self.cache.put(self.key, self.record.clone())
    }
}

impl Drop for WriteBack<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Unwind path: persist best-effort, the panic keeps propagating
        if let Err(e) = self.cache.put(self.key, self.record.clone()) {
            warn!(key = %self.key, "Write-back during unwind failed: {}", e);
        }
    }
}
