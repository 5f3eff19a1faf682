//! Parsers for the concrete on-disk shapes import files come in:
//! JSON `mcpServers`/`servers` maps, and Codex's `[mcp_servers.*]` TOML
//! tables.

use std::collections::HashMap;
use std::error::Error;

use crate::raw::RawEntry;

use super::ImportEntry;

/// Parse the JSON shape shared by Cursor, Claude Code, Claude Desktop,
/// Windsurf, and VS Code: a top-level `mcpServers` map (preferred) or
/// `servers` map (legacy).
pub fn parse_mcp_servers_json(contents: &str) -> Result<Vec<ImportEntry>, Box<dyn Error + Send + Sync>> {
    let value: serde_json::Value = serde_json::from_str(contents)?;
    let servers = value
        .get("mcpServers")
        .or_else(|| value.get("servers"))
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    let map = match servers {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => return Ok(Vec::new()),
        other => return Err(format!("expected an object, got {other}").into()),
    };

    let mut entries = Vec::with_capacity(map.len());
    for (name, raw_value) in map {
        let raw: RawEntry = serde_json::from_value(raw_value)?;
        entries.push(ImportEntry { name, raw });
    }
    Ok(entries)
}

/// Parse Codex's `[mcp_servers.<name>]` TOML tables. `bearerToken` becomes
/// an `Authorization: Bearer …` header on the normalized entry.
pub fn parse_codex_toml(contents: &str) -> Result<Vec<ImportEntry>, Box<dyn Error + Send + Sync>> {
    let doc: toml::Table = toml::from_str(contents)?;
    let Some(servers) = doc.get("mcp_servers") else {
        return Ok(Vec::new());
    };
    let servers = servers
        .as_table()
        .ok_or("`mcp_servers` must be a table of tables")?;

    let mut entries = Vec::with_capacity(servers.len());
    for (name, table_value) in servers {
        let table = table_value
            .as_table()
            .ok_or_else(|| format!("mcp_servers.{name} must be a table"))?;

        let mut raw = RawEntry {
            description: string_field(table, "description"),
            base_url: string_field(table, "url").or_else(|| string_field(table, "base_url")),
            command: string_field(table, "command"),
            client_name: string_field(table, "client_name"),
            oauth_redirect_url: string_field(table, "oauth_redirect_url"),
            ..Default::default()
        };

        if let Some(args) = table.get("args").and_then(|v| v.as_array()) {
            let args: Vec<String> = args
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            raw.args = Some(crate::raw::RawArgs::List(args));
        }

        if let Some(env) = table.get("env").and_then(|v| v.as_table()) {
            let map: HashMap<String, String> = env
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect();
            raw.env = Some(map);
        }

        if let Some(token) = string_field(table, "bearerToken") {
            let mut headers = HashMap::new();
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            raw.headers = Some(headers);
        }

        entries.push(ImportEntry {
            name: name.clone(),
            raw,
        });
    }
    Ok(entries)
}

fn string_field(table: &toml::Table, key: &str) -> Option<String> {
    table.get(key).and_then(|v| v.as_str()).map(str::to_string)
}
