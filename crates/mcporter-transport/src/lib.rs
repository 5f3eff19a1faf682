//! # mcporter-transport
//!
//! Transport Factory (C5), Process Reaper (C8), and Connect Orchestrator
//! (C7): everything involved in turning a normalized [`ServerDefinition`]
//! into a live, authenticated MCP session.
//!
//! [`ServerDefinition`]: mcporter_core::definition::ServerDefinition
//!
//! ## Module Organization
//!
//! - [`stdio`]: child-process transport, framed NDJSON over piped stdio
//! - [`http`]: unified streamable-HTTP / SSE transport
//! - [`reaper`]: stderr ring buffer and escalating termination
//! - [`finish_auth`]: the capability `orchestrator`'s auth retry loop needs
//! - [`orchestrator`]: the S0-S5 connect state machine

pub mod finish_auth;
pub mod http;
pub mod orchestrator;
pub mod reaper;
pub mod stdio;

pub use finish_auth::FinishAuth;
pub use http::{HttpTransport, HttpTransportMode};
pub use orchestrator::{connect, ConnectOptions, Connection, NoopPromotionSink, PromotionSink};
pub use reaper::{ReapOutcome, StderrRing};
pub use stdio::StdioTransport;
pub use tokio_util::sync::CancellationToken;
