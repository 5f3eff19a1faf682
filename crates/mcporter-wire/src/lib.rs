//! # mcporter-wire
//!
//! The minimal MCP client surface the Runtime design treats as an external
//! collaborator ("assumed to be supplied by an MCP client library providing
//! `connect`, `listTools`, `callTool`, `close`"). This crate supplies a
//! small, typed JSON-RPC implementation of that surface so the rest of the
//! workspace has something concrete to build and test against; it is
//! deliberately not a full MCP protocol SDK (no sampling, no elicitation,
//! no server-side support).

pub mod client;
pub mod jsonrpc;
pub mod transport;
pub mod types;

pub use client::JsonRpcClient;
pub use transport::Transport;
pub use types::{ResourceInfo, ResourcesResponse, ServerToolInfo, ToolCallResult};
