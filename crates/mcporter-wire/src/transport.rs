//! The byte-level [`Transport`] trait: stdio pipes, streamable HTTP, or SSE
//! carrying the MCP conversation. `mcporter-transport` supplies the
//! concrete implementations; this crate only needs the seam so
//! [`crate::client::JsonRpcClient`] can speak to any of them uniformly.

use async_trait::async_trait;
use mcporter_core::Result;
use serde_json::Value;

/// A connected, message-oriented channel to an MCP server.
///
/// Implementations own whatever resources the channel needs (a child
/// process, an HTTP session) and must release them in `close`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one JSON-RPC message (request or notification).
    async fn send(&self, message: Value) -> Result<()>;

    /// Receive the next JSON-RPC message from the peer.
    ///
    /// Callers that are waiting for a specific response id must be
    /// prepared to see notifications or out-of-order messages here and
    /// loop past them (see `JsonRpcClient::call`).
    async fn recv(&self) -> Result<Value>;

    /// Tear down the channel. Idempotent: closing twice must not panic or
    /// return an error.
    async fn close(&self) -> Result<()>;
}

/// Forwards through the vtable so a trait object can itself satisfy
/// [`Transport`] — lets the orchestrator hold one `Arc<dyn Transport>`
/// regardless of which concrete transport backs a given connection.
#[async_trait]
impl Transport for std::sync::Arc<dyn Transport> {
    async fn send(&self, message: Value) -> Result<()> {
        self.as_ref().send(message).await
    }

    async fn recv(&self) -> Result<Value> {
        self.as_ref().recv().await
    }

    async fn close(&self) -> Result<()> {
        self.as_ref().close().await
    }
}
