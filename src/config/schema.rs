//! Configuration schema for clusterscope
//!
//! Resolved once before the store handle opens, either from the
//! embedding container's string-keyed properties or from a TOML file.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Distributed store settings
    pub store: StoreConfig,

    /// Shutdown behavior
    pub shutdown: ShutdownConfig,
}

/// Distributed store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store endpoint URI. When unset, the provider default is used.
    pub uri: Option<String>,

    /// Cache/namespace name holding the scope entries
    pub name: String,

    /// Consult the registered loader on cache misses
    pub read_through: bool,

    /// Notify the registered writer on every put
    pub write_through: bool,

    /// Expose provider management hooks
    pub management_enabled: bool,

    /// Count store operations
    pub statistics_enabled: bool,

    /// Store detached value-copies instead of shared references
    pub store_by_value: bool,

    /// Registered name of the entry loader factory
    pub loader_factory: Option<String>,

    /// Registered name of the entry writer factory
    pub writer_factory: Option<String>,

    /// Registered name of the expiry policy factory
    pub expiry_factory: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            name: "scope-store".to_string(),
            read_through: false,
            write_through: false,
            management_enabled: false,
            statistics_enabled: false,
            store_by_value: false,
            loader_factory: None,
            writer_factory: None,
            expiry_factory: None,
        }
    }
}

/// Shutdown behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Invoke release handles for every live entry at shutdown
    pub release_nodes: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            release_nodes: true,
        }
    }
}
