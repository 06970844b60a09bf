//! Instance records held in the distributed store
//!
//! A record pairs a materialized component instance with the release
//! handle that runs its destruction callbacks. Exactly one logical
//! record exists per component key cluster-wide; the physical payload
//! may be transiently duplicated while a creation race settles.

use crate::error::ScopeResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Capability surface a stored object must provide
///
/// Blanket-implemented for any `T: Any + Send + Sync + Clone +
/// Serialize`: type-erased access for dispatch, a clone capability for
/// store-by-value copies, and a data-transfer capability that
/// serializes the instance without business side effects.
pub trait ScopedInstance: Any + Send + Sync {
    /// Clone the instance behind the trait object
    fn clone_value(&self) -> Box<dyn ScopedInstance>;

    /// Serialize the instance for data transfer
    fn transfer(&self) -> ScopeResult<serde_json::Value>;

    /// Type-erased shared access
    fn as_any(&self) -> &dyn Any;

    /// Type-erased mutable access
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> ScopedInstance for T
where
    T: Any + Send + Sync + Clone + Serialize,
{
    fn clone_value(&self) -> Box<dyn ScopedInstance> {
        Box::new(self.clone())
    }

    fn transfer(&self) -> ScopeResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Runs destruction callbacks when the scope releases an instance
pub trait CreationContext: Send + Sync {
    /// Release the instance created through this context
    fn release(&self);
}

/// Shared handle to a creation context, stored alongside the instance
pub type ReleaseHandle = Arc<dyn CreationContext>;

struct RecordInner {
    record_id: Uuid,
    created_at: DateTime<Utc>,
    instance: Option<Box<dyn ScopedInstance>>,
    release: Option<ReleaseHandle>,
}

/// Mutable holder for a materialized instance and its release handle
///
/// Cloning shares the holder, so a fetched record and a by-reference
/// store entry alias the same state. Use [`InstanceRecord::deep_clone`]
/// for a detached value-copy.
#[derive(Clone)]
pub struct InstanceRecord {
    inner: Arc<Mutex<RecordInner>>,
}

impl InstanceRecord {
    /// Create an empty record, not yet holding an instance
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecordInner {
                record_id: Uuid::new_v4(),
                created_at: Utc::now(),
                instance: None,
                release: None,
            })),
        }
    }

    /// Physical identity of this record payload
    pub fn record_id(&self) -> Uuid {
        self.lock().record_id
    }

    /// When this record payload was constructed
    pub fn created_at(&self) -> DateTime<Utc> {
        self.lock().created_at
    }

    /// Whether an instance has been materialized into this record
    pub fn has_instance(&self) -> bool {
        self.lock().instance.is_some()
    }

    /// Store a materialized instance and its release handle
    ///
    /// Not guarded against concurrent installs: two racing creators can
    /// both observe an empty record and each install, last write wins.
    pub fn install(&self, instance: Box<dyn ScopedInstance>, release: ReleaseHandle) {
        let mut inner = self.lock();
        inner.instance = Some(instance);
        inner.release = Some(release);
    }

    /// Run a closure against the held instance, if any
    pub fn with_value<R>(&self, f: impl FnOnce(Option<&mut dyn ScopedInstance>) -> R) -> R {
        let mut inner = self.lock();
        f(inner.instance.as_deref_mut())
    }

    /// Serialize the held instance for data transfer
    pub fn snapshot(&self) -> ScopeResult<Option<serde_json::Value>> {
        let inner = self.lock();
        inner.instance.as_ref().map(|i| i.transfer()).transpose()
    }

    /// Invoke the release handle, if one was installed
    ///
    /// Returns whether a handle ran. The callback runs outside the
    /// record lock.
    pub fn release(&self) -> bool {
        let handle = self.lock().release.clone();
        match handle {
            Some(handle) => {
                handle.release();
                true
            }
            None => false,
        }
    }

    /// Detached value-copy of this record
    ///
    /// The instance is cloned through its clone capability; the release
    /// handle and record identity are shared, since a value-copy is the
    /// same logical record.
    pub fn deep_clone(&self) -> Self {
        let inner = self.lock();
        Self {
            inner: Arc::new(Mutex::new(RecordInner {
                record_id: inner.record_id,
                created_at: inner.created_at,
                instance: inner.instance.as_ref().map(|i| i.clone_value()),
                release: inner.release.clone(),
            })),
        }
    }

    // A panicked caller must not wedge the record: write-back still has
    // to run on unwind, so poison is stripped.
    fn lock(&self) -> MutexGuard<'_, RecordInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InstanceRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("InstanceRecord")
            .field("record_id", &inner.record_id)
            .field("created_at", &inner.created_at)
            .field("has_instance", &inner.instance.is_some())
            .field("has_release", &inner.release.is_some())
            .finish()
    }
}
