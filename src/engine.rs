//! Lifecycle orchestration engine
//!
//! [`ServerEngine`] ties the client, reporter, and configuration together and
//! hosts the per-name leases. The operations themselves live in the
//! [`inventory`](crate::inventory), [`lifecycle`](crate::lifecycle), and
//! [`retention`](crate::retention) modules as further `impl` blocks.
//!
//! The engine keeps no state across operations beyond the leases: every call
//! re-derives the world from the remote API.

use crate::client::CloudClient;
use crate::config::EngineConfig;
use crate::reporter::Reporter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Snapshot-backed server lifecycle engine
pub struct ServerEngine {
    client: Arc<dyn CloudClient>,
    reporter: Arc<dyn Reporter>,
    config: EngineConfig,
    leases: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ServerEngine {
    /// Create an engine over a cloud client and a progress sink
    pub fn new(
        client: Arc<dyn CloudClient>,
        reporter: Arc<dyn Reporter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            client,
            reporter,
            config,
            leases: Mutex::new(HashMap::new()),
        }
    }

    /// The injected cloud client
    pub(crate) fn client(&self) -> &dyn CloudClient {
        self.client.as_ref()
    }

    /// Engine configuration
    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Emit one progress message through the sink
    pub(crate) async fn report(&self, message: impl AsRef<str>) {
        self.reporter.report(message.as_ref()).await;
    }

    /// Acquire the lease for a logical name, serializing concurrent
    /// operations on the same server. Held for the full operation and
    /// released on every exit path when the guard drops.
    pub(crate) async fn lease(&self, name: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut leases = self.leases.lock().await;
            // A strong count of 1 means only the map still holds the slot:
            // no guard and no waiter. Evict those so the map stays bounded
            // by the names currently in flight.
            leases.retain(|_, slot| Arc::strong_count(slot) > 1);
            leases
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) async fn lease_count(&self) -> usize {
        self.leases.lock().await.len()
    }
}
