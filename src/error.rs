//! Error types for clusterscope
//!
//! All modules use `ScopeResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for scope operations
pub type ScopeResult<T> = Result<T, ScopeError>;

/// All errors that can occur in clusterscope
#[derive(Error, Debug)]
pub enum ScopeError {
    // Configuration errors
    #[error("Invalid store URI: {uri}: {reason}")]
    UriInvalid { uri: String, reason: String },

    #[error("Invalid configuration option {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Unknown {kind} factory: {name}. Register it before opening the store.")]
    UnknownFactory { kind: &'static str, name: String },

    // Store errors
    #[error("Failed to open store manager at {uri}: {reason}")]
    ManagerOpen { uri: String, reason: String },

    #[error("Failed to create cache {name}: {reason}")]
    CacheCreate { name: String, reason: String },

    #[error("Store is closed: {0}")]
    StoreClosed(String),

    #[error("Store operation failed: {0}")]
    Store(String),

    // Resolution errors
    #[error("Component {component} is not passivation capable: a stable passivation id is required for cluster scoping")]
    NotPassivationCapable { component: String },

    #[error("Record for {key} holds no instance")]
    InstanceMissing { key: String },

    #[error("Instance for {key} is not a {expected}")]
    InstanceType { key: String, expected: &'static str },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScopeError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a store URI error
    pub fn uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UriInvalid {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration option error
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a store operation error
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store(reason.into())
    }

    /// Check if error is a configuration problem (fails fast, non-retryable)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UriInvalid { .. }
                | Self::ConfigInvalid { .. }
                | Self::ConfigNotFound(_)
                | Self::UnknownFactory { .. }
                | Self::TomlParse(_)
        )
    }
}
