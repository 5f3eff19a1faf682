//! Result shapes returned by the MCP client surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool a server advertises via `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerToolInfo {
    /// Tool name, as invoked by `callTool`.
    pub name: String,
    /// Human-readable description, if the server provided one.
    #[serde(default)]
    pub description: Option<String>,
    /// JSON-Schema-shaped input schema, present when the caller requested
    /// `includeSchema = true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// The envelope a `tools/call` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Structured or text content the tool produced.
    pub content: Value,
    /// `true` when the server reports this result as an error (`ToolFault`
    /// in spec terms); this is carried as a marker on the envelope, not
    /// raised as a Rust error, per spec.md §7.
    #[serde(default)]
    pub is_error: bool,
}

/// One resource a server advertises via `resources/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// Resource URI.
    pub uri: String,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Optional MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// The envelope a `resources/list` call returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesResponse {
    /// The resources the server advertised.
    #[serde(default)]
    pub resources: Vec<ResourceInfo>,
}
