//! Cross-module scenarios that need a real `Runtime`, not just one crate's
//! unit tests — the teacher splits small-unit tests inline and
//! cross-module scenarios into a top-level `tests/` directory; this mirrors
//! that split.

use mcporter_core::definition::{CommandSpec, DefinitionSource, ServerDefinition};
use mcporter_runtime::{CancellationToken, ListToolsOptions, Runtime};

fn stdio_def(name: &str, command: &str) -> ServerDefinition {
    ServerDefinition {
        name: name.to_string(),
        description: None,
        command: CommandSpec::Stdio {
            command: command.to_string(),
            args: vec![],
            cwd: std::env::temp_dir(),
        },
        env: None,
        auth: None,
        token_cache_dir: None,
        client_name: None,
        oauth_redirect_url: None,
        source: DefinitionSource::adhoc(),
    }
}

/// A single stdio server survives a full connect / close / re-list cycle
/// without disappearing from the registry.
#[tokio::test]
async fn a_stdio_server_survives_connect_and_close() {
    let runtime = Runtime::new("tests", vec![stdio_def("local", "cat")]);

    assert_eq!(runtime.list_servers().await, vec!["local".to_string()]);

    let connection = runtime.connect("local", false, &CancellationToken::new()).await.unwrap();
    connection.close().await;
    runtime.close(Some("local")).await;

    assert_eq!(runtime.list_servers().await, vec!["local".to_string()]);
}

/// Two concurrent `listTools` calls against a cold pool share exactly one
/// underlying connection attempt.
#[tokio::test]
async fn concurrent_list_tools_share_one_connection() {
    let runtime = Runtime::new("tests", vec![stdio_def("shared", "cat")]);

    let (a, b) = tokio::join!(
        runtime.list_tools("shared", ListToolsOptions::default(), &CancellationToken::new()),
        runtime.list_tools("shared", ListToolsOptions::default(), &CancellationToken::new()),
    );

    assert!(a.unwrap().is_empty());
    assert!(b.unwrap().is_empty());

    runtime.close(Some("shared")).await;
}

/// `listTools(autoAuthorize: false)` never populates the pool: a later
/// `close` call for the same name is a harmless no-op.
#[tokio::test]
async fn list_tools_without_auto_authorize_is_ephemeral() {
    let runtime = Runtime::new("tests", vec![stdio_def("ephemeral", "cat")]);

    let tools = runtime
        .list_tools(
            "ephemeral",
            ListToolsOptions {
                include_schema: true,
                auto_authorize: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(tools.is_empty());

    // No-op: nothing was ever pooled for this name.
    runtime.close(Some("ephemeral")).await;
}

/// An empty registry reports `listServers() == []`, per spec.md §8's
/// boundary case.
#[tokio::test]
async fn empty_registry_lists_no_servers() {
    let runtime = Runtime::new("tests", vec![]);
    assert!(runtime.list_servers().await.is_empty());
}
