//! Connection Pool (C6): memoizes one connection per server name, shares an
//! in-flight connect attempt between concurrent first-callers, and evicts a
//! failed attempt so the next caller starts fresh.
//!
//! Grounded on `tokio::sync::OnceCell`'s documented retry-on-error
//! semantics (a failed `get_or_try_init` leaves the cell uninitialized), no
//! teacher file implements an equivalent pool — the teacher's MCP client
//! library owns its own connection lifecycle internally.

use std::collections::HashMap;
use std::sync::Arc;

use mcporter_core::definition::ServerDefinition;
use mcporter_core::Result;
use mcporter_transport::{connect as orchestrator_connect, CancellationToken, ConnectOptions, Connection, PromotionSink};
use tokio::sync::{Mutex as TokioMutex, OnceCell};

type Slot = Arc<OnceCell<Arc<Connection>>>;

/// Memoizes one `(client, transport, session)` tuple per server name.
#[derive(Default)]
pub struct ConnectionPool {
    entries: TokioMutex<HashMap<String, Slot>>,
}

impl ConnectionPool {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// `connect(name)`: returns the cached connection, creating it under a
    /// lock if absent. Concurrent first-connectors share one in-flight
    /// attempt. `skip_cache` bypasses the pool entirely — each call
    /// produces (and never stores) a fresh connection, used for
    /// list-without-auth (spec.md §4.6).
    pub async fn connect(
        &self,
        definition: &ServerDefinition,
        client_name: &str,
        options: ConnectOptions,
        promotion: &dyn PromotionSink,
        skip_cache: bool,
        cancellation: &CancellationToken,
    ) -> Result<Arc<Connection>> {
        if skip_cache {
            return orchestrator_connect(definition, client_name, options, promotion, cancellation)
                .await
                .map(Arc::new);
        }

        let slot = {
            let mut entries = self.entries.lock().await;
            entries.entry(definition.name.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = slot
            .get_or_try_init(|| async {
                orchestrator_connect(definition, client_name, options, promotion, cancellation).await.map(Arc::new)
            })
            .await;

        match result {
            Ok(connection) => Ok(connection.clone()),
            Err(err) => {
                // The failed cell never actually initialized (OnceCell's
                // contract), but drop our reference to it anyway so a
                // concurrent second failure doesn't keep racing the same
                // cell indefinitely under unusual cancellation patterns.
                self.entries.lock().await.remove(&definition.name);
                Err(err)
            }
        }
    }

    /// Close and evict a single pooled entry, if present. A no-op for
    /// names that were never connected or already closed.
    pub async fn close(&self, name: &str) {
        let slot = self.entries.lock().await.remove(name);
        if let Some(slot) = slot {
            if let Some(connection) = slot.get() {
                connection.close().await;
            }
        }
    }

    /// Close and evict every pooled entry (shutdown path).
    pub async fn close_all(&self) {
        let drained: Vec<Slot> = self.entries.lock().await.drain().map(|(_, slot)| slot).collect();
        for slot in drained {
            if let Some(connection) = slot.get() {
                connection.close().await;
            }
        }
    }
}
