//! Unified error type for the Runtime.
//!
//! Mirrors the teacher's single-error-type convention (one `thiserror` enum
//! per crate, one `#[error("...")]` variant per kind) rather than boxed
//! `anyhow::Error` at library boundaries.

use std::path::PathBuf;

/// Result type alias used across the workspace's library crates.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Every error kind the Runtime and its subsystems can surface.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// `getDefinition`/`connect`/... referenced a name not in the registry.
    #[error("unknown server: {0}")]
    UnknownServer(String),

    /// `registerDefinition` without `overwrite` collided with an existing name.
    #[error("server already registered: {0}")]
    DuplicateServer(String),

    /// The primary config file was explicitly named but failed to parse.
    #[error("failed to parse config file {path}: {source}")]
    ConfigParseError {
        /// Path to the offending file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An import file existed but failed to parse.
    #[error("failed to parse import file {path}: {source}")]
    ImportParseError {
        /// Path to the offending file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A `${VAR}` placeholder had no value and no default.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    /// Upstream returned 401/403 or an equivalent tolerant-matched message.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An OAuth flow could not be completed on the current transport.
    #[error("transport does not support completing an OAuth flow")]
    OAuthUnsupportedByTransport,

    /// Any connect failure not classified as `Unauthorized`.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// A caller-provided deadline was exceeded, or the caller cancelled the
    /// operation via its `CancellationToken` before it completed.
    #[error("operation timed out")]
    Timeout,

    /// The server returned a structured tool-level error.
    #[error("tool fault: {0}")]
    ToolFault(String),

    /// Filesystem I/O failure not otherwise classified.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path the I/O operation was performed against.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    /// `true` when this error should be classified as `Unauthorized` per the
    /// tolerant matcher in spec.md §4.7 ("Unauthorized detection").
    ///
    /// Accepts either the typed `Unauthorized` variant or a stringified
    /// message matching `\b(401|403)\b` or `unauthorized|invalid[_-]?token|forbidden`
    /// (case-insensitive). Upstream MCP servers return wildly different
    /// error shapes, so this is deliberately permissive.
    pub fn looks_unauthorized(&self) -> bool {
        match self {
            RuntimeError::Unauthorized(_) => true,
            other => classify_unauthorized(&other.to_string()),
        }
    }
}

/// Stand-alone classifier so call sites that only have a stringified error
/// (e.g. from the wire layer) can still route through one predicate instead
/// of re-implementing the regex-like match ad hoc.
pub fn classify_unauthorized(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    if lower.contains("unauthorized") || lower.contains("forbidden") {
        return true;
    }
    if lower.contains("invalid_token") || lower.contains("invalid-token") {
        return true;
    }
    contains_word(&lower, "401") || contains_word(&lower, "403")
}

/// Word-boundary containment check good enough for short status-code tokens;
/// avoids pulling in a regex crate for two three-digit literals.
fn contains_word(haystack: &str, word: &str) -> bool {
    let bytes = haystack.as_bytes();
    let wlen = word.len();
    if wlen == 0 || wlen > bytes.len() {
        return false;
    }
    let is_boundary = |b: Option<u8>| !matches!(b, Some(c) if c.is_ascii_alphanumeric());
    for start in 0..=(bytes.len() - wlen) {
        if &haystack[start..start + wlen] == word {
            let before = if start == 0 { None } else { Some(bytes[start - 1]) };
            let after = bytes.get(start + wlen).copied();
            if is_boundary(before) && is_boundary(after) {
                return true;
            }
        }
    }
    false
}
