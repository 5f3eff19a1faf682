//! A small typed JSON-RPC client implementing the `connect / listTools /
//! callTool / listResources / close` surface spec.md treats as supplied by
//! an external MCP client library.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use mcporter_core::{Result, RuntimeError};
use serde_json::{json, Value};

use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::transport::Transport;
use crate::types::{ResourcesResponse, ServerToolInfo, ToolCallResult};

/// An MCP client speaking JSON-RPC over an arbitrary [`Transport`].
///
/// One instance owns exactly one transport; callers that need to retry
/// after a failed connect construct a fresh client over a fresh transport
/// rather than reusing this one (matches the Connection Pool's "invalidate
/// on failure" policy in spec.md §4.6).
pub struct JsonRpcClient<T: Transport> {
    transport: Arc<T>,
    next_id: AtomicI64,
}

impl<T: Transport> JsonRpcClient<T> {
    /// Wrap an already-connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            next_id: AtomicI64::new(1),
        }
    }

    /// Perform the MCP `initialize` handshake.
    pub async fn initialize(&self, client_name: &str) -> Result<Value> {
        self.call(
            "initialize",
            Some(json!({
                "protocolVersion": "2025-06-18",
                "clientInfo": { "name": client_name, "version": env!("CARGO_PKG_VERSION") },
                "capabilities": {},
            })),
        )
        .await
    }

    /// `tools/list`.
    pub async fn list_tools(&self) -> Result<Vec<ServerToolInfo>> {
        let result = self.call("tools/list", None).await?;
        let tools = result
            .get("tools")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(tools)
            .map_err(|e| RuntimeError::TransportFailure(format!("malformed tools/list response: {e}")))
    }

    /// `tools/call`.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<ToolCallResult> {
        let result = self
            .call(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments.unwrap_or(json!({})) })),
            )
            .await?;
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let content = result.get("content").cloned().unwrap_or(Value::Null);
        Ok(ToolCallResult { content, is_error })
    }

    /// `resources/list`.
    pub async fn list_resources(&self, params: Option<Value>) -> Result<ResourcesResponse> {
        let result = self.call("resources/list", params).await?;
        serde_json::from_value(result)
            .map_err(|e| RuntimeError::TransportFailure(format!("malformed resources/list response: {e}")))
    }

    /// Close the underlying transport. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.transport.close().await
    }

    /// Send a request and wait for the response carrying a matching id,
    /// skipping any notifications or stale responses that arrive first.
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(RequestId::Number(id), method, params);
        let message = serde_json::to_value(&request)
            .map_err(|e| RuntimeError::TransportFailure(format!("failed to encode request: {e}")))?;
        self.transport.send(message).await?;

        loop {
            let raw = self.transport.recv().await?;
            let Ok(response) = serde_json::from_value::<JsonRpcResponse>(raw) else {
                // Not a response shape we recognize (e.g. a server->client
                // request); ignore and keep waiting for our id.
                continue;
            };
            match response.id {
                Some(RequestId::Number(got)) if got == id => {}
                Some(_) | None => {
                    tracing::debug!(method, expected_id = id, "skipping response with a non-matching id");
                    continue;
                }
            }
            if let Some(error) = response.error {
                let message = error.to_string();
                return Err(if mcporter_core::error::classify_unauthorized(&message) {
                    RuntimeError::Unauthorized(message)
                } else {
                    RuntimeError::ToolFault(message)
                });
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    struct FakeTransport {
        inbox: Mutex<VecDeque<Value>>,
        sent: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, message: Value) -> Result<()> {
            let id = message.get("id").cloned().unwrap_or(Value::Null);
            self.sent.lock().await.push(message);
            self.inbox
                .lock()
                .await
                .push_back(json!({ "jsonrpc": "2.0", "id": id, "result": { "tools": [] } }));
            Ok(())
        }

        async fn recv(&self) -> Result<Value> {
            self.inbox
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| RuntimeError::TransportFailure("no more messages".into()))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn list_tools_round_trips_through_fake_transport() {
        let transport = FakeTransport {
            inbox: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        };
        let client = JsonRpcClient::new(transport);
        let tools = client.list_tools().await.unwrap();
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_error_is_classified() {
        struct UnauthorizedTransport;

        #[async_trait]
        impl Transport for UnauthorizedTransport {
            async fn send(&self, _message: Value) -> Result<()> {
                Ok(())
            }
            async fn recv(&self) -> Result<Value> {
                Ok(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": -32000, "message": "401 Unauthorized" }
                }))
            }
            async fn close(&self) -> Result<()> {
                Ok(())
            }
        }

        let client = JsonRpcClient::new(UnauthorizedTransport);
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Unauthorized(_)));
    }
}
