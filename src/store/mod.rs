//! Distributed store client chain
//!
//! The provider → manager → cache seam the scope resolves against,
//! the lazily-initialized process handle, and an in-process provider
//! for tests and single-node embedding.

pub mod handle;
pub mod memory;
pub mod provider;

pub use handle::StoreHandle;
pub use memory::MemoryProvider;
pub use provider::{CacheManager, CacheOptions, CacheProvider, CacheStats, StoreCache, StoreUri};
