//! # mcporter-runtime
//!
//! Connection Pool (C6) and Runtime Façade (C9): the long-lived object
//! applications hold, and the memoization layer underneath it.
//!
//! ## Module Organization
//!
//! - [`pool`]: per-server connection memoization over `mcporter-transport`
//! - [`facade`]: the public `Runtime` type

pub mod facade;
pub mod pool;

pub use facade::{ListToolsOptions, RegisterOptions, Runtime};
pub use pool::ConnectionPool;
pub use mcporter_transport::CancellationToken;
