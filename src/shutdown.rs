//! Orderly teardown of the scope store
//!
//! Runs when the owning process or container signals shutdown: live
//! records are drained and the store client chain is closed. Terminal;
//! process-wide state is not reset afterwards.

use crate::store::handle::StoreHandle;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drains live records and closes the store client chain
pub struct ShutdownCoordinator {
    handle: Arc<StoreHandle>,
}

impl ShutdownCoordinator {
    /// Prepare a teardown for the given handle
    pub fn new(handle: Arc<StoreHandle>) -> Self {
        Self { handle }
    }

    /// Run the teardown sequence
    ///
    /// When `release_nodes` is configured (the default), every record
    /// reachable in the store has its release handle invoked. The
    /// cache, manager, and provider are then closed in order; each
    /// close is best-effort so one failure never blocks the rest.
    /// Returns the number of released records.
    pub fn run(self) -> usize {
        let released = if self.handle.config().shutdown.release_nodes {
            self.drain()
        } else {
            debug!("Shutdown drain disabled by configuration");
            0
        };

        self.handle.close_chain();
        released
    }

    fn drain(&self) -> usize {
        let entries = match self.handle.acquire().and_then(|cache| cache.entries()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping shutdown drain, store unavailable: {}", e);
                return 0;
            }
        };

        let mut released = 0;
        for (key, record) in entries {
            if record.release() {
                released += 1;
                debug!(key = %key, "Released scoped instance");
            }
        }

        info!(released, "Drained scope store");
        released
    }
}
