//! Definition Loader (component C3): resolves the primary config file,
//! walks the import list in declared order, merges entries first-wins, and
//! normalizes the result into [`ServerDefinition`]s.

use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};

use mcporter_core::{DefinitionSource, Result, RuntimeError, ServerDefinition, ADHOC_PATH};
use serde::Deserialize;

use crate::imports::{read_import, ImportKind};
use crate::raw::{normalize, RawEntry};

/// Inputs to [`load`]: an optional explicit config path and an optional
/// root directory (defaults to the process working directory).
#[derive(Debug, Default, Clone)]
pub struct LoaderOptions {
    /// Explicit config file path. Takes precedence over `MCPORTER_CONFIG`
    /// and the default search locations.
    pub explicit_config_path: Option<PathBuf>,
    /// Root directory imports are resolved relative to. Defaults to the
    /// process working directory.
    pub root: Option<PathBuf>,
}

/// The raw shape of the primary config file (spec.md §6).
#[derive(Debug, Default, Deserialize)]
struct PrimaryConfigFile {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: HashMap<String, RawEntry>,
    #[serde(default)]
    imports: Option<Vec<String>>,
}

fn parse_primary(contents: &str) -> std::result::Result<PrimaryConfigFile, Box<dyn Error + Send + Sync>> {
    Ok(serde_json::from_str(contents)?)
}

/// Load and merge every configuration source into a flat list of
/// normalized definitions, sorted by name.
pub fn load(options: LoaderOptions) -> Result<Vec<ServerDefinition>> {
    let root = options
        .root
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let (config_path, is_explicit) = resolve_config_path(options.explicit_config_path.as_deref(), &root);

    let primary = load_primary(config_path.as_deref(), is_explicit)?;

    let import_order = determine_import_order(&primary.imports);

    // name -> (raw entry, origin)
    let mut accumulator: HashMap<String, (RawEntry, DefinitionSource)> = HashMap::new();

    for kind in import_order {
        if let Some((file, entries)) = read_import(kind, &root)? {
            for entry in entries {
                accumulator
                    .entry(entry.name)
                    .or_insert_with(|| (entry.raw, DefinitionSource::Import { path: file.clone() }));
            }
        }
    }

    let local_source = config_path
        .clone()
        .map(|path| DefinitionSource::Local { path })
        .unwrap_or_else(|| DefinitionSource::Local { path: PathBuf::from(ADHOC_PATH) });

    for (name, raw) in primary.mcp_servers {
        accumulator.insert(name, (raw, local_source.clone()));
    }

    let local_base_dir = config_path
        .as_ref()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or(root);

    let mut defs: Vec<ServerDefinition> = accumulator
        .into_iter()
        .map(|(name, (raw, source))| {
            let base_dir = match &source {
                DefinitionSource::Local { .. } => local_base_dir.clone(),
                DefinitionSource::Import { path } => {
                    path.parent().map(Path::to_path_buf).unwrap_or_else(|| local_base_dir.clone())
                }
            };
            normalize(&name, raw, &base_dir, source)
        })
        .collect();

    defs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(defs)
}

fn load_primary(config_path: Option<&Path>, is_explicit: bool) -> Result<PrimaryConfigFile> {
    let Some(path) = config_path else {
        return Ok(PrimaryConfigFile::default());
    };

    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(source) => {
            if is_explicit {
                return Err(RuntimeError::ConfigParseError {
                    path: path.to_path_buf(),
                    source: Box::new(source),
                });
            }
            return Ok(PrimaryConfigFile::default());
        }
    };

    match parse_primary(&contents) {
        Ok(primary) => Ok(primary),
        Err(source) => {
            if is_explicit {
                Err(RuntimeError::ConfigParseError {
                    path: path.to_path_buf(),
                    source,
                })
            } else {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "failed to parse mcporter config; proceeding with an empty configuration"
                );
                Ok(PrimaryConfigFile::default())
            }
        }
    }
}

/// Resolve the primary config file by precedence: explicit path →
/// `MCPORTER_CONFIG` → `<root>/config/mcporter.json` → `<home>/.mcporter/
/// mcporter.{json,jsonc}` → none. The first two are "explicit": a missing
/// or unparseable file at those locations is a hard error, not a silent
/// fallback to empty configuration (see `DESIGN.md`, open question on
/// explicit-file semantics).
fn resolve_config_path(explicit: Option<&Path>, root: &Path) -> (Option<PathBuf>, bool) {
    if let Some(path) = explicit {
        return (Some(path.to_path_buf()), true);
    }
    if let Ok(env_path) = std::env::var("MCPORTER_CONFIG") {
        if !env_path.is_empty() {
            return (Some(PathBuf::from(env_path)), true);
        }
    }
    let project_config = root.join("config").join("mcporter.json");
    if project_config.is_file() {
        return (Some(project_config), false);
    }
    if let Some(home) = dirs::home_dir() {
        let json = home.join(".mcporter").join("mcporter.json");
        if json.is_file() {
            return (Some(json), false);
        }
        let jsonc = home.join(".mcporter").join("mcporter.jsonc");
        if jsonc.is_file() {
            return (Some(jsonc), false);
        }
    }
    (None, false)
}

/// `imports: []` disables imports entirely; a present, non-empty list is
/// used as given and then appended with any unmentioned default kinds;
/// absence uses the full default order.
fn determine_import_order(imports: &Option<Vec<String>>) -> Vec<ImportKind> {
    match imports {
        None => ImportKind::DEFAULT_ORDER.to_vec(),
        Some(list) if list.is_empty() => Vec::new(),
        Some(list) => {
            let mut order: Vec<ImportKind> = list.iter().filter_map(|s| ImportKind::parse(s)).collect();
            for kind in ImportKind::DEFAULT_ORDER {
                if !order.contains(&kind) {
                    order.push(kind);
                }
            }
            order
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcporter_core::CommandSpec;
    use std::fs;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn empty_mcp_servers_is_legal() {
        let dir = tempfile::tempdir().unwrap();
        let defs = load(LoaderOptions {
            explicit_config_path: None,
            root: Some(dir.path().to_path_buf()),
        })
        .unwrap();
        assert!(defs.is_empty());
    }

    #[test]
    fn imports_empty_list_disables_imports() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join(".codex").join("config.toml"),
            "[mcp_servers.codex_only]\ncommand = \"echo\"\n",
        );
        write(
            &dir.path().join("config").join("mcporter.json"),
            r#"{"imports": []}"#,
        );
        let defs = load(LoaderOptions {
            explicit_config_path: None,
            root: Some(dir.path().to_path_buf()),
        })
        .unwrap();
        assert!(defs.is_empty());
    }

    #[test]
    fn scenario_s1_single_stdio_server() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("config").join("mcporter.json"),
            r#"{"mcpServers": {"local": {"command": "echo", "args": ["hi"]}}}"#,
        );
        let defs = load(LoaderOptions {
            explicit_config_path: None,
            root: Some(dir.path().to_path_buf()),
        })
        .unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "local");
        assert!(defs[0].command.is_stdio());
    }

    #[test]
    fn scenario_s2_local_overrides_import_first_wins_among_imports() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join(".codex").join("config.toml"),
            "[mcp_servers.shared]\nurl = \"https://codex/mcp\"\n[mcp_servers.codex_only]\ncommand = \"echo\"\n",
        );
        write(
            &dir.path().join("config").join("mcporter.json"),
            r#"{"imports": ["codex"], "mcpServers": {"shared": {"url": "https://local/mcp"}}}"#,
        );
        let defs = load(LoaderOptions {
            explicit_config_path: None,
            root: Some(dir.path().to_path_buf()),
        })
        .unwrap();

        let shared = defs.iter().find(|d| d.name == "shared").unwrap();
        match &shared.command {
            CommandSpec::Http { url, .. } => assert_eq!(url, "https://local/mcp"),
            _ => panic!("expected http"),
        }
        assert!(matches!(shared.source, DefinitionSource::Local { .. }));

        let codex_only = defs.iter().find(|d| d.name == "codex_only").unwrap();
        assert!(matches!(codex_only.source, DefinitionSource::Import { .. }));
    }

    #[test]
    fn implicit_parse_failure_warns_and_continues_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("config").join("mcporter.json"), "{ not json");
        let defs = load(LoaderOptions {
            explicit_config_path: None,
            root: Some(dir.path().to_path_buf()),
        })
        .unwrap();
        assert!(defs.is_empty());
    }

    #[test]
    fn explicit_parse_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        write(&path, "{ not json");
        let err = load(LoaderOptions {
            explicit_config_path: Some(path),
            root: Some(dir.path().to_path_buf()),
        })
        .unwrap_err();
        assert!(matches!(err, RuntimeError::ConfigParseError { .. }));
    }

    #[test]
    fn import_order_permutation_without_name_collision_is_order_independent() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join(".cursor").join("mcp.json"),
            r#"{"mcpServers": {"cursor_only": {"command": "echo"}}}"#,
        );
        write(
            &dir.path().join(".codex").join("config.toml"),
            "[mcp_servers.codex_only]\ncommand = \"echo\"\n",
        );

        let order_a = vec!["cursor".to_string(), "codex".to_string()];
        let order_b = vec!["codex".to_string(), "cursor".to_string()];

        for order in [order_a, order_b] {
            write(
                &dir.path().join("config").join("mcporter.json"),
                &serde_json::json!({ "imports": order }).to_string(),
            );
            let defs = load(LoaderOptions {
                explicit_config_path: None,
                root: Some(dir.path().to_path_buf()),
            })
            .unwrap();
            let mut names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
            names.sort();
            assert_eq!(names, vec!["codex_only", "cursor_only"]);
        }
    }
}
