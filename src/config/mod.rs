//! Configuration resolution for clusterscope

pub mod schema;

pub use schema::{ScopeConfig, ShutdownConfig, StoreConfig};

use crate::error::{ScopeError, ScopeResult};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// String-keyed properties supplied by the embedding container
pub type Properties = BTreeMap<String, String>;

/// Prefix shared by all recognized property keys
pub const PROPERTY_PREFIX: &str = "clusterscope.";

impl ScopeConfig {
    /// Resolve configuration from container-supplied properties
    ///
    /// Recognized keys use the `clusterscope.` prefix and the option
    /// names `config-uri`, `name`, `readThrough`, `writeThrough`,
    /// `managementEnabled`, `statisticsEnabled`, `storeByValue`,
    /// `loaderFactory`, `writerFactory`, `expiryFactory` and
    /// `release-nodes`. Unrecognized keys are ignored.
    pub fn from_properties(props: &Properties) -> ScopeResult<Self> {
        let mut config = Self::default();

        if let Some(uri) = property(props, "config-uri") {
            config.store.uri = Some(uri.to_string());
        }
        if let Some(name) = property(props, "name") {
            config.store.name = name.to_string();
        }
        config.store.read_through = flag(props, "readThrough");
        config.store.write_through = flag(props, "writeThrough");
        config.store.management_enabled = flag(props, "managementEnabled");
        config.store.statistics_enabled = flag(props, "statisticsEnabled");
        config.store.store_by_value = flag(props, "storeByValue");
        config.store.loader_factory = property(props, "loaderFactory").map(String::from);
        config.store.writer_factory = property(props, "writerFactory").map(String::from);
        config.store.expiry_factory = property(props, "expiryFactory").map(String::from);

        if let Some(release) = property(props, "release-nodes") {
            config.shutdown.release_nodes = release.eq_ignore_ascii_case("true");
        }

        config.validate()
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> ScopeResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> ScopeResult<Self> {
        if !path.exists() {
            return Err(ScopeError::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ScopeError::io(format!("reading config from {}", path.display()), e))?;

        debug!("Loaded scope configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    fn validate(self) -> ScopeResult<Self> {
        if self.store.name.trim().is_empty() {
            return Err(ScopeError::config("name", "cache name must not be empty"));
        }
        Ok(self)
    }
}

/// Look up a recognized option by its unprefixed name
fn property<'a>(props: &'a Properties, name: &str) -> Option<&'a str> {
    props
        .get(&format!("{}{}", PROPERTY_PREFIX, name))
        .map(String::as_str)
}

/// Boolean options are true only for a case-insensitive "true"
fn flag(props: &Properties, name: &str) -> bool {
    property(props, name).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
