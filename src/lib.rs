//! clusterscope - Cluster-wide component scope
//!
//! Gives long-lived scope semantics to component instances shared
//! across a cluster: an instance is created at most once per logical
//! key, persisted into a distributed cache so any node can resolve it,
//! and re-persisted after every observed call.

pub mod config;
pub mod error;
pub mod key;
pub mod record;
pub mod registry;
pub mod scope;
pub mod shutdown;
pub mod store;

pub use config::{Properties, ScopeConfig};
pub use error::{ScopeError, ScopeResult};
pub use key::ComponentKey;
pub use record::{CreationContext, InstanceRecord, ReleaseHandle, ScopedInstance};
pub use registry::FactoryRegistry;
pub use scope::{ClusterScope, Component, ScopeContext, ScopeProxy, SCOPE_NAME};
pub use store::{MemoryProvider, StoreHandle};
