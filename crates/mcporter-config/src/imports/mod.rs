//! Import readers (component C2).
//!
//! For each import kind, [`ImportKind::candidate_paths`] produces an
//! ordered list of candidate paths; [`read_import`] walks them and the
//! first one that exists and parses wins. A file that exists but fails to
//! parse is surfaced as [`RuntimeError::ImportParseError`] — not silenced —
//! while a missing file yields no entries and no error.

mod shapes;

use std::path::{Path, PathBuf};

use mcporter_core::{Result, RuntimeError};

use crate::raw::RawEntry;

/// One entry read from an import file, still attached to the file it came
/// from (the loader needs this for origin tracking and `cwd` defaulting).
#[derive(Debug, Clone)]
pub struct ImportEntry {
    /// Server name.
    pub name: String,
    /// Raw, pre-normalization entry.
    pub raw: RawEntry,
}

/// The known import kinds, in the default load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// Cursor editor `.cursor/mcp.json`.
    Cursor,
    /// Claude Code `.claude/mcp.json` / `~/.claude.json`.
    ClaudeCode,
    /// Claude Desktop `claude_desktop_config.json`.
    ClaudeDesktop,
    /// Codex CLI `config.toml`.
    Codex,
    /// Windsurf editor `mcp_config.json`.
    Windsurf,
    /// VS Code `mcp.json` (stable and Insiders).
    Vscode,
}

impl ImportKind {
    /// The default import order when a config omits `imports` entirely.
    pub const DEFAULT_ORDER: [ImportKind; 6] = [
        ImportKind::Cursor,
        ImportKind::ClaudeCode,
        ImportKind::ClaudeDesktop,
        ImportKind::Codex,
        ImportKind::Windsurf,
        ImportKind::Vscode,
    ];

    /// Parse a kind from its config-file string name.
    pub fn parse(s: &str) -> Option<ImportKind> {
        match s {
            "cursor" => Some(ImportKind::Cursor),
            "claude-code" => Some(ImportKind::ClaudeCode),
            "claude-desktop" => Some(ImportKind::ClaudeDesktop),
            "codex" => Some(ImportKind::Codex),
            "windsurf" => Some(ImportKind::Windsurf),
            "vscode" => Some(ImportKind::Vscode),
            _ => None,
        }
    }

    /// The config-file string name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Cursor => "cursor",
            ImportKind::ClaudeCode => "claude-code",
            ImportKind::ClaudeDesktop => "claude-desktop",
            ImportKind::Codex => "codex",
            ImportKind::Windsurf => "windsurf",
            ImportKind::Vscode => "vscode",
        }
    }

    /// Ordered candidate paths for this kind, project-root locations first.
    pub fn candidate_paths(&self, root: &Path) -> Vec<PathBuf> {
        let home = dirs::home_dir();
        let config = dirs::config_dir();
        match self {
            ImportKind::Cursor => {
                let mut v = vec![root.join(".cursor").join("mcp.json")];
                if let Some(cfg) = &config {
                    v.push(cfg.join("Cursor").join("User").join("mcp.json"));
                }
                v
            }
            ImportKind::ClaudeCode => {
                let mut v = vec![root.join(".claude").join("mcp.json")];
                if let Some(home) = &home {
                    v.push(home.join(".claude").join("mcp.json"));
                    v.push(home.join(".claude.json"));
                }
                v
            }
            ImportKind::ClaudeDesktop => {
                let mut v = Vec::new();
                if let Some(cfg) = &config {
                    v.push(cfg.join("Claude").join("claude_desktop_config.json"));
                }
                v
            }
            ImportKind::Codex => {
                let mut v = vec![root.join(".codex").join("config.toml")];
                if let Some(home) = &home {
                    v.push(home.join(".codex").join("config.toml"));
                }
                v
            }
            ImportKind::Windsurf => {
                let mut v = Vec::new();
                if let Some(cfg) = &config {
                    v.push(cfg.join("Codeium").join("windsurf").join("mcp_config.json"));
                }
                if let Some(home) = &home {
                    v.push(
                        home.join(".codeium")
                            .join("windsurf")
                            .join("mcp_config.json"),
                    );
                }
                v
            }
            ImportKind::Vscode => {
                let mut v = Vec::new();
                if let Some(cfg) = &config {
                    v.push(cfg.join("Code").join("User").join("mcp.json"));
                    v.push(cfg.join("Code - Insiders").join("User").join("mcp.json"));
                }
                v
            }
        }
    }
}

/// Result of attempting to read one import kind: either no candidate
/// existed (`None`), or the first existing candidate's parsed entries
/// along with the path that won (for origin tracking).
pub fn read_import(kind: ImportKind, root: &Path) -> Result<Option<(PathBuf, Vec<ImportEntry>)>> {
    for candidate in kind.candidate_paths(root) {
        if !candidate.is_file() {
            continue;
        }
        let contents = std::fs::read_to_string(&candidate).map_err(|source| RuntimeError::Io {
            path: candidate.clone(),
            source,
        })?;
        let entries = parse_shape(kind, &contents).map_err(|source| RuntimeError::ImportParseError {
            path: candidate.clone(),
            source,
        })?;
        return Ok(Some((candidate, entries)));
    }
    Ok(None)
}

fn parse_shape(
    kind: ImportKind,
    contents: &str,
) -> std::result::Result<Vec<ImportEntry>, Box<dyn std::error::Error + Send + Sync>> {
    match kind {
        ImportKind::Codex => shapes::parse_codex_toml(contents),
        _ => shapes::parse_mcp_servers_json(contents),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_matches_spec() {
        let order: Vec<&str> = ImportKind::DEFAULT_ORDER.iter().map(ImportKind::as_str).collect();
        assert_eq!(
            order,
            vec!["cursor", "claude-code", "claude-desktop", "codex", "windsurf", "vscode"]
        );
    }

    #[test]
    fn missing_file_yields_no_entries_and_no_error() {
        let root = tempfile::tempdir().unwrap();
        let result = read_import(ImportKind::Cursor, root.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn existing_but_unparseable_file_errors() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(".cursor")).unwrap();
        std::fs::write(root.path().join(".cursor").join("mcp.json"), "{ not json").unwrap();
        let err = read_import(ImportKind::Cursor, root.path()).unwrap_err();
        assert!(matches!(err, RuntimeError::ImportParseError { .. }));
    }

    #[test]
    fn first_candidate_wins() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(".cursor")).unwrap();
        std::fs::write(
            root.path().join(".cursor").join("mcp.json"),
            r#"{"mcpServers": {"local": {"command": "echo"}}}"#,
        )
        .unwrap();
        let (path, entries) = read_import(ImportKind::Cursor, root.path()).unwrap().unwrap();
        assert_eq!(path, root.path().join(".cursor").join("mcp.json"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "local");
    }
}
