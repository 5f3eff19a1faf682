//! Raw, pre-normalization entry shape and the normalizer (component C3's
//! per-entry half; the merge algorithm lives in [`crate::loader`]).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use mcporter_core::{AuthMode, CommandSpec, DefinitionSource, ServerDefinition};
use serde::{Deserialize, Serialize};

/// `Accept` header every HTTP definition gets if the entry didn't set one.
const DEFAULT_ACCEPT_HEADER: &str = "application/json, text/event-stream";

/// The union of recognized editor shapes, before normalization.
///
/// Deserialized directly from the primary config file and from each import
/// reader's native shape (after the reader maps provider-specific fields,
/// e.g. Codex's `bearerToken`, onto this common shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEntry {
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,

    /// Any of `baseUrl | base_url | url | serverUrl | server_url` makes this
    /// an HTTP entry.
    #[serde(default, alias = "base_url", alias = "url", alias = "serverUrl", alias = "server_url")]
    pub base_url: Option<String>,

    /// `command | executable`, combined with `args`, makes this a stdio
    /// entry when `base_url` is absent.
    #[serde(default, alias = "executable")]
    pub command: Option<String>,

    /// String, array-of-strings, or single-string (split on whitespace with
    /// shell quoting only when no array is supplied).
    #[serde(default)]
    pub args: Option<RawArgs>,

    /// Unresolved template strings; never resolved during loading.
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,

    /// Unresolved header template strings (HTTP entries only).
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    /// Only the literal value `"oauth"` is recognized; anything else is
    /// discarded during normalization.
    #[serde(default)]
    pub auth: Option<String>,

    /// Explicit override for the OAuth token cache directory.
    #[serde(default)]
    pub token_cache_dir: Option<String>,

    /// Optional OAuth client metadata.
    #[serde(default)]
    pub client_name: Option<String>,

    /// Optional OAuth redirect URL override.
    #[serde(default)]
    pub oauth_redirect_url: Option<String>,

    /// Accepted but unused by the core (`"keep-alive"` is the only known
    /// value); kept so round-tripping through `serialize-as-raw` doesn't
    /// drop it.
    #[serde(default)]
    pub lifecycle: Option<String>,
}

/// `args` accepts either a single whitespace-delimited string or an
/// explicit array; this is the untagged union of both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawArgs {
    /// A single string, split on whitespace with basic shell quoting.
    Single(String),
    /// An explicit, already-split argument list.
    List(Vec<String>),
}

impl RawArgs {
    /// Resolve to a concrete argument vector, applying shell-style
    /// word-splitting only to the `Single` variant.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            RawArgs::Single(s) => shellwords::split(&s).unwrap_or_else(|_| {
                s.split_whitespace().map(str::to_string).collect()
            }),
            RawArgs::List(v) => v,
        }
    }
}

/// Normalize a raw entry into an immutable [`ServerDefinition`].
///
/// `base_dir` is the directory of the file that contributed `raw` (used as
/// the stdio `cwd` default so imports resolve relative paths against their
/// own file rather than the process working directory).
pub fn normalize(
    name: &str,
    raw: RawEntry,
    base_dir: &Path,
    source: DefinitionSource,
) -> ServerDefinition {
    let command = if let Some(url) = raw.base_url {
        let mut headers = raw.headers.unwrap_or_default();
        if !headers.keys().any(|k| k.eq_ignore_ascii_case("accept")) {
            headers.insert("Accept".to_string(), DEFAULT_ACCEPT_HEADER.to_string());
        }
        CommandSpec::Http { url, headers }
    } else {
        let command = raw.command.unwrap_or_default();
        let args = raw.args.map(RawArgs::into_vec).unwrap_or_default();
        CommandSpec::Stdio {
            command,
            args,
            cwd: base_dir.to_path_buf(),
        }
    };

    let auth = match raw.auth.as_deref() {
        Some("oauth") => Some(AuthMode::OAuth),
        _ => None,
    };

    let token_cache_dir = raw
        .token_cache_dir
        .map(PathBuf::from)
        .or_else(|| {
            if auth == Some(AuthMode::OAuth) {
                ServerDefinition::default_token_cache_dir(name)
            } else {
                None
            }
        });

    ServerDefinition {
        name: name.to_string(),
        description: raw.description,
        command,
        env: raw.env,
        auth,
        token_cache_dir,
        client_name: raw.client_name,
        oauth_redirect_url: raw.oauth_redirect_url,
        source,
    }
}

/// Serialize a [`ServerDefinition`] back into a [`RawEntry`], the inverse
/// operation the idempotence property in spec.md §8 relies on:
/// `normalize(serialize_as_raw(normalize(e))) == normalize(e)`.
pub fn serialize_as_raw(def: &ServerDefinition) -> RawEntry {
    let mut raw = RawEntry {
        description: def.description.clone(),
        auth: def.auth.map(|_| "oauth".to_string()),
        token_cache_dir: def
            .token_cache_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
        client_name: def.client_name.clone(),
        oauth_redirect_url: def.oauth_redirect_url.clone(),
        env: def.env.clone(),
        ..Default::default()
    };
    match &def.command {
        CommandSpec::Http { url, headers } => {
            raw.base_url = Some(url.clone());
            raw.headers = Some(headers.clone());
        }
        CommandSpec::Stdio { command, args, .. } => {
            raw.command = Some(command.clone());
            raw.args = Some(RawArgs::List(args.clone()));
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn local_source() -> DefinitionSource {
        DefinitionSource::Local {
            path: PathBuf::from("/config/mcporter.json"),
        }
    }

    #[test]
    fn http_entry_gets_default_accept_header() {
        let raw = RawEntry {
            base_url: Some("https://example/mcp".into()),
            ..Default::default()
        };
        let def = normalize("svc", raw, Path::new("/config"), local_source());
        match def.command {
            CommandSpec::Http { headers, .. } => {
                assert_eq!(
                    headers.get("Accept").map(String::as_str),
                    Some("application/json, text/event-stream")
                );
            }
            _ => panic!("expected http"),
        }
    }

    #[test]
    fn existing_accept_header_is_preserved() {
        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        let raw = RawEntry {
            base_url: Some("https://example/mcp".into()),
            headers: Some(headers),
            ..Default::default()
        };
        let def = normalize("svc", raw, Path::new("/config"), local_source());
        match def.command {
            CommandSpec::Http { headers, .. } => {
                assert_eq!(headers.get("Accept").map(String::as_str), Some("application/json"));
            }
            _ => panic!("expected http"),
        }
    }

    #[test]
    fn stdio_cwd_defaults_to_contributing_directory() {
        let raw = RawEntry {
            command: Some("echo".into()),
            args: Some(RawArgs::Single("hi there".into())),
            ..Default::default()
        };
        let def = normalize("svc", raw, Path::new("/imports/codex"), local_source());
        match def.command {
            CommandSpec::Stdio { cwd, args, .. } => {
                assert_eq!(cwd, PathBuf::from("/imports/codex"));
                assert_eq!(args, vec!["hi".to_string(), "there".to_string()]);
            }
            _ => panic!("expected stdio"),
        }
    }

    #[test]
    fn unknown_auth_values_are_discarded() {
        let raw = RawEntry {
            base_url: Some("https://example/mcp".into()),
            auth: Some("basic".into()),
            ..Default::default()
        };
        let def = normalize("svc", raw, Path::new("/config"), local_source());
        assert_eq!(def.auth, None);
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = RawEntry {
            base_url: Some("https://example/mcp".into()),
            auth: Some("oauth".into()),
            ..Default::default()
        };
        let once = normalize("svc", raw, Path::new("/config"), local_source());
        let raw_again = serialize_as_raw(&once);
        let twice = normalize("svc", raw_again, Path::new("/config"), local_source());
        assert_eq!(once, twice);
    }

    #[test]
    fn args_array_form_is_used_verbatim() {
        let raw = RawEntry {
            command: Some("node".into()),
            args: Some(RawArgs::List(vec!["a b".into(), "c".into()])),
            ..Default::default()
        };
        let def = normalize("svc", raw, Path::new("/x"), local_source());
        match def.command {
            CommandSpec::Stdio { args, .. } => assert_eq!(args, vec!["a b".to_string(), "c".to_string()]),
            _ => panic!("expected stdio"),
        }
    }
}
