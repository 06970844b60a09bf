//! Component key derivation
//!
//! A component key identifies one component definition cluster-wide.
//! The same definition must produce the same key on every node, and
//! two different definitions must never collide. Same name + same
//! qualifiers = same key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque, stable identifier for a component definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentKey(String);

impl ComponentKey {
    /// Wrap an already-stable identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a key from a component name and its qualifier set
    ///
    /// Qualifiers are sorted before hashing so declaration order does
    /// not change the key.
    pub fn derive(name: &str, qualifiers: &[&str]) -> Self {
        let mut sorted: Vec<&str> = qualifiers.to_vec();
        sorted.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        for qualifier in &sorted {
            hasher.update([0u8]);
            hasher.update(qualifier.as_bytes());
        }
        let digest = hex::encode(hasher.finalize());

        Self(format!("{}#{}", name, &digest[..12]))
    }

    /// The key as a store-ready string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ComponentKey {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ComponentKey {
    fn from(id: String) -> Self {
        Self(id)
    }
}
