//! Cluster scope resolution
//!
//! Resolves a component definition to a proxy-wrapped instance held in
//! the distributed store, creating the instance at most once per key
//! cluster-wide.

pub mod proxy;

pub use proxy::ScopeProxy;

use crate::config::ScopeConfig;
use crate::error::{ScopeError, ScopeResult};
use crate::key::ComponentKey;
use crate::record::{CreationContext, InstanceRecord, ScopedInstance};
use crate::registry::FactoryRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::store::handle::StoreHandle;
use crate::store::provider::{CacheProvider, StoreCache};
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the scope this crate provides
pub const SCOPE_NAME: &str = "cluster";

/// A component definition resolvable in the cluster scope
pub trait Component: Send + Sync {
    /// Component name for diagnostics
    fn name(&self) -> &str;

    /// Stable cluster-wide identity
    ///
    /// `None` means the component cannot be passivated and is not
    /// eligible for cluster scoping.
    fn passivation_id(&self) -> Option<ComponentKey>;

    /// Materialize a new instance through the creation context
    fn create(&self, ctx: &dyn CreationContext) -> Box<dyn ScopedInstance>;
}

/// Resolver implementing the generic scope contract
#[derive(Clone)]
pub struct ScopeContext {
    handle: Arc<StoreHandle>,
}

impl ScopeContext {
    pub(crate) fn new(handle: Arc<StoreHandle>) -> Self {
        Self { handle }
    }

    /// Scope identifier reported to the host container
    pub fn scope_name(&self) -> &'static str {
        SCOPE_NAME
    }

    /// The cluster scope is active for the whole process lifetime
    pub fn is_active(&self) -> bool {
        true
    }

    /// Passive lookup: resolve an existing instance without creating
    ///
    /// Returns `None` and leaves the store untouched when no entry
    /// exists for the component's key.
    pub fn get(&self, component: &dyn Component) -> ScopeResult<Option<ScopeProxy>> {
        let key = component_key(component)?;
        let cache = self.storage()?;

        match cache.get(&key)? {
            Some(record) => Ok(Some(ScopeProxy::new(key, record, cache))),
            None => Ok(None),
        }
    }

    /// Resolve the instance for a component, creating it if needed
    ///
    /// Returns `None` without side effects when no creation context is
    /// supplied: nothing could be materialized on a miss, so the lookup
    /// is not attempted.
    pub fn get_or_create(
        &self,
        component: &dyn Component,
        creation: Option<Arc<dyn CreationContext>>,
    ) -> ScopeResult<Option<ScopeProxy>> {
        let Some(creation) = creation else {
            return Ok(None);
        };
        let key = component_key(component)?;
        let cache = self.storage()?;

        let record = match cache.get(&key)? {
            Some(record) => record,
            None => self.publish_record(&cache, &key)?,
        };

        // No guard on the instance field itself: two racers can both
        // observe an empty record and each materialize; the last write
        // wins and the loser's release handle is never invoked.
        if !record.has_instance() {
            let instance = component.create(creation.as_ref());
            record.install(instance, Arc::clone(&creation));
            info!(key = %key, component = component.name(), "Materialized scoped instance");
        }

        Ok(Some(ScopeProxy::new(key, record, cache)))
    }

    /// Publish a fresh empty record, settling creation races through
    /// the store's atomic swap
    fn publish_record(
        &self,
        cache: &Arc<dyn StoreCache>,
        key: &ComponentKey,
    ) -> ScopeResult<InstanceRecord> {
        let fresh = InstanceRecord::new();
        match cache.get_and_put(key, fresh.clone())? {
            Some(winner) => {
                // Another node or thread won: adopt its record and
                // republish it so this process reads its own write
                cache.put(key, winner.clone())?;
                debug!(key = %key, "Adopted concurrently created record");
                Ok(winner)
            }
            None => Ok(fresh),
        }
    }

    fn storage(&self) -> ScopeResult<Arc<dyn StoreCache>> {
        self.handle.acquire()
    }
}

/// The stable key for a component, or the capability error naming what
/// is missing
fn component_key(component: &dyn Component) -> ScopeResult<ComponentKey> {
    component
        .passivation_id()
        .ok_or_else(|| ScopeError::NotPassivationCapable {
            component: component.name().to_string(),
        })
}

/// Owning bootstrap surface wiring the scope into a host container
///
/// The host registers `context()` as its scope provider and calls
/// `shutdown()` from its teardown notification.
pub struct ClusterScope {
    handle: Arc<StoreHandle>,
}

impl ClusterScope {
    /// Assemble a scope from configuration, a store provider, and the
    /// factory registry
    pub fn bootstrap(
        config: ScopeConfig,
        provider: Arc<dyn CacheProvider>,
        registry: FactoryRegistry,
    ) -> Self {
        Self::from_handle(StoreHandle::new(config, provider, registry))
    }

    /// Assemble a scope around a pre-built store handle
    pub fn from_handle(handle: StoreHandle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Resolver handed to the host container
    pub fn context(&self) -> ScopeContext {
        ScopeContext::new(Arc::clone(&self.handle))
    }

    /// Direct access to the backing cache, opening the store if needed
    ///
    /// Intended for host-container integration and diagnostics; regular
    /// resolution goes through [`ClusterScope::context`].
    pub fn storage(&self) -> ScopeResult<Arc<dyn StoreCache>> {
        self.handle.acquire()
    }

    /// Drain live records and close the store client chain
    ///
    /// Terminal: returns the number of released records; no further
    /// operations are valid on this scope afterwards.
    pub fn shutdown(self) -> usize {
        ShutdownCoordinator::new(self.handle).run()
    }
}
