//! # mcporter
//!
//! Runtime toolkit for discovering, authenticating against, and calling
//! Model Context Protocol servers, gathered behind one [`Runtime`] object.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mcporter::{CancellationToken, LoaderOptions, Runtime};
//!
//! # async fn run() -> mcporter::Result<()> {
//! let runtime = Runtime::load("my-app", LoaderOptions::default())?;
//! for name in runtime.list_servers().await {
//!     println!("{name}");
//! }
//! let tools = runtime
//!     .list_tools("notes", Default::default(), &CancellationToken::new())
//!     .await?;
//! println!("{} tools available", tools.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! This crate is a thin façade; the workspace crates doing the actual work
//! are re-exported for callers who need lower-level control:
//!
//! - [`mcporter_core`]: the shared data model and unified error type
//! - [`mcporter_config`]: placeholder resolution, editor imports, definition loading
//! - [`mcporter_wire`]: the JSON-RPC client and wire types
//! - [`mcporter_transport`]: transport factory, connect orchestrator, process reaper
//! - [`mcporter_auth`]: OAuth loopback session, discovery, dynamic client registration
//! - [`mcporter_runtime`]: the connection pool and [`Runtime`] façade itself

pub use mcporter_core::definition::{AuthMode, CommandSpec, DefinitionSource, ServerDefinition};
pub use mcporter_core::error::{Result, RuntimeError};
pub use mcporter_config::loader::LoaderOptions;
pub use mcporter_runtime::{CancellationToken, ConnectionPool, ListToolsOptions, RegisterOptions, Runtime};
pub use mcporter_wire::{ResourceInfo, ResourcesResponse, ServerToolInfo, ToolCallResult};

pub use mcporter_auth;
pub use mcporter_core;
pub use mcporter_config;
pub use mcporter_runtime;
pub use mcporter_transport;
pub use mcporter_wire;
