//! JSON-RPC 2.0 envelope types used for every MCP message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version literal.
pub const JSONRPC_VERSION: &str = "2.0";

/// Request/response correlation id — string or number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id, used by [`crate::client::JsonRpcClient`]'s internal counter.
    Number(i64),
    /// String id, accepted for interop with servers that issue their own.
    String(String),
}

/// An outgoing JSON-RPC request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Correlation id.
    pub id: RequestId,
    /// Method name, e.g. `tools/call`.
    pub method: String,
    /// Method parameters, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request with the standard `jsonrpc: "2.0"` field.
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// An incoming JSON-RPC response or error.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Correlation id echoed back from the request.
    #[serde(default)]
    pub id: Option<RequestId>,
    /// Successful result payload.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error payload, mutually exclusive with `result`.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonRpcError {
    /// JSON-RPC or MCP-extension error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured error data.
    #[serde(default)]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}
