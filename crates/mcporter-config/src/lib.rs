//! # mcporter-config
//!
//! Configuration merging and placeholder resolution: the Placeholder
//! Resolver (C1), Import Readers (C2), and Definition Loader (C3) from the
//! Runtime design.
//!
//! Placeholders in `env` and HTTP headers are intentionally left
//! unresolved by everything in this crate; [`placeholder::resolve`] is
//! called by `mcporter-transport` at transport materialization time so
//! that process environment changes between calls take effect.

pub mod imports;
pub mod loader;
pub mod placeholder;
pub mod raw;

pub use imports::ImportKind;
pub use loader::{load, LoaderOptions};
pub use raw::{normalize, serialize_as_raw, RawArgs, RawEntry};
