//! Normalized server definitions.
//!
//! A [`ServerDefinition`] is immutable once constructed, except for the
//! atomic-replace performed by the OAuth promotion path (see
//! `mcporter-transport::orchestrator`), which produces a *new* definition
//! rather than mutating fields in place.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sentinel `source.path` for definitions synthesized at the CLI boundary.
///
/// Only ad-hoc definitions are eligible for automatic OAuth promotion
/// (spec.md §4.7, state `S3 MaybePromote`).
pub const ADHOC_PATH: &str = "<adhoc>";

/// A normalized, immutable MCP server definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerDefinition {
    /// Non-empty identifier, unique within a Runtime.
    pub name: String,

    /// Optional free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The transport-level command: HTTP endpoint or stdio child process.
    pub command: CommandSpec,

    /// Unresolved template strings. Resolution is deferred to invocation
    /// time (spec.md §3, "Invariants": placeholders are never resolved
    /// during loading).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,

    /// Only `Some(AuthMode::OAuth)` is recognized; unknown values are
    /// discarded during normalization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthMode>,

    /// Defaults to `<home>/.mcporter/<name>` when `auth = OAuth`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_cache_dir: Option<PathBuf>,

    /// Optional OAuth client metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Optional OAuth redirect URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_redirect_url: Option<String>,

    /// Where this definition came from (local config, an import, or the
    /// ad-hoc CLI boundary).
    pub source: DefinitionSource,
}

/// Tagged union of transports a [`ServerDefinition`] may target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CommandSpec {
    /// Streamable HTTP or SSE (the orchestrator decides which at connect
    /// time; both share this same command shape).
    Http {
        /// Endpoint URL.
        url: String,
        /// Unresolved header template strings.
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
    },
    /// A child process speaking framed JSON over stdio.
    Stdio {
        /// Executable to spawn.
        command: String,
        /// Arguments passed to the executable.
        #[serde(default)]
        args: Vec<String>,
        /// Working directory for the child process.
        cwd: PathBuf,
    },
}

impl CommandSpec {
    /// `true` for the `Http` variant.
    pub fn is_http(&self) -> bool {
        matches!(self, CommandSpec::Http { .. })
    }

    /// `true` for the `Stdio` variant.
    pub fn is_stdio(&self) -> bool {
        matches!(self, CommandSpec::Stdio { .. })
    }
}

/// Recognized authentication modes. Only `OAuth` exists today; the type
/// stays an enum (rather than `bool`) so a future mode doesn't require
/// changing every call site's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Interactive OAuth 2.1 authorization-code flow with a loopback
    /// callback listener.
    OAuth,
}

/// Where a [`ServerDefinition`] was contributed from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DefinitionSource {
    /// Contributed by the primary config file, or synthesized at the CLI
    /// boundary (in which case `path` is [`ADHOC_PATH`]).
    Local {
        /// Path to the contributing file, or the ad-hoc sentinel.
        path: PathBuf,
    },
    /// Contributed by one of the foreign editor import readers.
    Import {
        /// Path to the import file that defined this entry.
        path: PathBuf,
    },
}

impl DefinitionSource {
    /// `true` when `self` is the `Local` variant pointing at the ad-hoc
    /// sentinel path — the only definitions eligible for OAuth promotion.
    pub fn is_adhoc(&self) -> bool {
        matches!(self, DefinitionSource::Local { path } if path.as_os_str() == ADHOC_PATH)
    }

    /// Construct the ad-hoc sentinel source.
    pub fn adhoc() -> Self {
        DefinitionSource::Local {
            path: PathBuf::from(ADHOC_PATH),
        }
    }
}

impl ServerDefinition {
    /// Default token cache directory: `<home>/.mcporter/<name>`.
    pub fn default_token_cache_dir(name: &str) -> Option<PathBuf> {
        dirs_home().map(|home| home.join(".mcporter").join(name))
    }

    /// Produce the OAuth-promoted successor definition used by
    /// `S3 MaybePromote` (spec.md §4.7). Only valid to call when
    /// `self.source.is_adhoc() && self.command.is_http() && self.auth !=
    /// Some(AuthMode::OAuth)`; callers enforce that precondition.
    pub fn promoted_to_oauth(&self) -> ServerDefinition {
        let mut next = self.clone();
        next.auth = Some(AuthMode::OAuth);
        next.token_cache_dir = next
            .token_cache_dir
            .or_else(|| Self::default_token_cache_dir(&next.name));
        next
    }
}

fn dirs_home() -> Option<PathBuf> {
    dirs::home_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adhoc_http(name: &str) -> ServerDefinition {
        ServerDefinition {
            name: name.to_string(),
            description: None,
            command: CommandSpec::Http {
                url: "https://example/mcp".into(),
                headers: HashMap::new(),
            },
            env: None,
            auth: None,
            token_cache_dir: None,
            client_name: None,
            oauth_redirect_url: None,
            source: DefinitionSource::adhoc(),
        }
    }

    #[test]
    fn promotion_only_changes_auth_and_token_cache_dir() {
        let before = adhoc_http("X");
        let after = before.promoted_to_oauth();

        assert_eq!(after.auth, Some(AuthMode::OAuth));
        assert!(after.token_cache_dir.is_some());
        assert_eq!(after.name, before.name);
        assert_eq!(after.command, before.command);
        assert_eq!(after.source, before.source);
    }

    #[test]
    fn is_adhoc_detects_sentinel_only() {
        assert!(DefinitionSource::adhoc().is_adhoc());
        assert!(!DefinitionSource::Local {
            path: PathBuf::from("/etc/mcporter.json")
        }
        .is_adhoc());
        assert!(!DefinitionSource::Import {
            path: PathBuf::from("/home/x/.codex/config.toml")
        }
        .is_adhoc());
    }

    #[test]
    fn round_trips_through_json() {
        let def = adhoc_http("roundtrip");
        let json = serde_json::to_string(&def).unwrap();
        let back: ServerDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(def, back);
    }
}
