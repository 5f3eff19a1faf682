//! Runtime Façade (C9): the public operations `listServers / getDefinitions
//! / getDefinition / registerDefinition / listTools / callTool /
//! listResources / connect / close`.
//!
//! Grounded on the teacher's top-level `turbomcp::Server` builder for the
//! overall "one long-lived object fronting a registry + pool" shape,
//! adapted since the teacher is itself the MCP server, not a client
//! managing many of them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcporter_config::loader::{self, LoaderOptions};
use mcporter_core::definition::ServerDefinition;
use mcporter_core::{Result, RuntimeError};
use mcporter_transport::{
    connect as orchestrator_connect, CancellationToken, ConnectOptions, Connection, PromotionSink,
};
use mcporter_wire::{ResourcesResponse, ServerToolInfo, ToolCallResult};
use tokio::sync::RwLock;

use crate::pool::ConnectionPool;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn timeout_from_env(var: &str) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Options for [`Runtime::list_tools`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ListToolsOptions {
    /// Reserved for callers that want to suppress per-tool JSON schemas
    /// from the returned envelope; currently unused since
    /// [`ServerToolInfo`] always carries its schema.
    pub include_schema: bool,
    /// `false` runs an ephemeral, uncached connection with interactive
    /// OAuth disabled (`skipCache=true`, `maxOAuthAttempts=0`), per
    /// spec.md §4.9.
    pub auto_authorize: bool,
}

impl ListToolsOptions {
    fn default_authorized() -> Self {
        Self {
            include_schema: true,
            auto_authorize: true,
        }
    }
}

/// Options for [`Runtime::register_definition`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterOptions {
    /// Replace an existing definition of the same name instead of failing
    /// with `DuplicateServer`.
    pub overwrite: bool,
}

/// The long-lived Runtime object: a merged definition registry plus a
/// connection pool, presenting the public operations callers use.
pub struct Runtime {
    client_name: String,
    definitions: RwLock<HashMap<String, ServerDefinition>>,
    pool: ConnectionPool,
}

/// Applies an OAuth-promoted definition back into the live registry,
/// implementing the write side of `S3 MaybePromote` (spec.md §4.7).
struct RegistryPromotionSink<'a> {
    definitions: &'a RwLock<HashMap<String, ServerDefinition>>,
}

#[async_trait]
impl PromotionSink for RegistryPromotionSink<'_> {
    async fn promote(&self, promoted: ServerDefinition) {
        self.definitions.write().await.insert(promoted.name.clone(), promoted);
    }
}

impl Runtime {
    /// Build a Runtime from an already-loaded set of definitions.
    pub fn new(client_name: impl Into<String>, definitions: Vec<ServerDefinition>) -> Self {
        let map = definitions.into_iter().map(|d| (d.name.clone(), d)).collect();
        Self {
            client_name: client_name.into(),
            definitions: RwLock::new(map),
            pool: ConnectionPool::new(),
        }
    }

    /// Build a Runtime by running the Definition Loader (C3) with
    /// `options`.
    pub fn load(client_name: impl Into<String>, options: LoaderOptions) -> Result<Self> {
        let definitions = loader::load(options)?;
        Ok(Self::new(client_name, definitions))
    }

    /// Sorted server names.
    pub async fn list_servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// A snapshot of every definition currently registered.
    pub async fn get_definitions(&self) -> Vec<ServerDefinition> {
        let mut defs: Vec<ServerDefinition> = self.definitions.read().await.values().cloned().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// A single definition by name.
    pub async fn get_definition(&self, name: &str) -> Result<ServerDefinition> {
        self.definitions
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownServer(name.to_string()))
    }

    /// Add or replace a definition.
    pub async fn register_definition(&self, definition: ServerDefinition, options: RegisterOptions) -> Result<()> {
        let mut defs = self.definitions.write().await;
        if !options.overwrite && defs.contains_key(&definition.name) {
            return Err(RuntimeError::DuplicateServer(definition.name));
        }
        defs.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// `connect(name)`: returns a pooled (or, with `skip_cache`, ephemeral)
    /// live connection.
    ///
    /// `cancellation` is distinct from the fixed env-configured timeouts
    /// `list_tools`/`call_tool`/`list_resources` race: it lets the caller
    /// abandon a connect attempt on its own schedule (e.g. the user closed
    /// the dialog waiting on an OAuth browser flow), releasing the OAuth
    /// loopback listener instead of leaving it bound until the fixed
    /// timeout elapses.
    pub async fn connect(&self, name: &str, skip_cache: bool, cancellation: &CancellationToken) -> Result<Arc<Connection>> {
        let definition = self.get_definition(name).await?;
        let options = ConnectOptions::default();
        let promotion = RegistryPromotionSink {
            definitions: &self.definitions,
        };
        self.pool
            .connect(&definition, &self.client_name, options, &promotion, skip_cache, cancellation)
            .await
    }

    /// `tools/list`, racing the façade-level list timeout
    /// (`MCPORTER_LIST_TIMEOUT`, default 30s) and `cancellation`.
    pub async fn list_tools(
        &self,
        name: &str,
        options: ListToolsOptions,
        cancellation: &CancellationToken,
    ) -> Result<Vec<ServerToolInfo>> {
        let _ = options.include_schema;
        let timeout = timeout_from_env("MCPORTER_LIST_TIMEOUT");

        if !options.auto_authorize {
            let definition = self.get_definition(name).await?;
            let promotion = mcporter_transport::NoopPromotionSink;
            let connection = orchestrator_connect(
                &definition,
                &self.client_name,
                ConnectOptions { max_oauth_attempts: 0 },
                &promotion,
                cancellation,
            )
            .await?;
            let result = race(timeout, cancellation, connection.client.list_tools()).await;
            connection.close().await;
            return result;
        }

        let connection = self.connect(name, false, cancellation).await?;
        match race(timeout, cancellation, connection.client.list_tools()).await {
            Ok(tools) => Ok(tools),
            Err(err) => {
                tracing::warn!(server = name, error = %err, "listTools failed; closing pooled connection");
                self.pool.close(name).await;
                Err(err)
            }
        }
    }

    /// `tools/call`, racing the façade-level call timeout
    /// (`MCPORTER_CALL_TIMEOUT`, default 30s) and `cancellation`.
    pub async fn call_tool(
        &self,
        name: &str,
        tool: &str,
        args: Option<serde_json::Value>,
        cancellation: &CancellationToken,
    ) -> Result<ToolCallResult> {
        let timeout = timeout_from_env("MCPORTER_CALL_TIMEOUT");
        let connection = self.connect(name, false, cancellation).await?;
        match race(timeout, cancellation, connection.client.call_tool(tool, args)).await {
            Ok(result) => Ok(result),
            Err(err) => {
                tracing::warn!(server = name, tool, error = %err, "callTool failed; closing pooled connection");
                self.pool.close(name).await;
                Err(err)
            }
        }
    }

    /// `resources/list`, racing the façade-level list timeout and
    /// `cancellation`.
    pub async fn list_resources(
        &self,
        name: &str,
        params: Option<serde_json::Value>,
        cancellation: &CancellationToken,
    ) -> Result<ResourcesResponse> {
        let timeout = timeout_from_env("MCPORTER_LIST_TIMEOUT");
        let connection = self.connect(name, false, cancellation).await?;
        match race(timeout, cancellation, connection.client.list_resources(params)).await {
            Ok(result) => Ok(result),
            Err(err) => {
                tracing::warn!(server = name, error = %err, "listResources failed; closing pooled connection");
                self.pool.close(name).await;
                Err(err)
            }
        }
    }

    /// Close one pooled server, or every pooled server when `name` is
    /// `None`.
    pub async fn close(&self, name: Option<&str>) {
        match name {
            Some(name) => self.pool.close(name).await,
            None => self.pool.close_all().await,
        }
    }
}

impl Default for ListToolsOptions {
    fn default() -> Self {
        Self::default_authorized()
    }
}

/// Races `future` against a fixed-duration timeout and the caller's
/// cancellation token, whichever fires first — the same two-mechanism shape
/// the teacher's `ToolTimeoutManager::execute_with_timeout_and_cancellation`
/// selects over, with a dedicated cancellation branch rather than treating
/// cancellation as just another deadline.
async fn race<T>(
    duration: Duration,
    cancellation: &CancellationToken,
    future: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        result = future => result,
        () = tokio::time::sleep(duration) => Err(RuntimeError::Timeout),
        () = cancellation.cancelled() => Err(RuntimeError::Timeout),
    }
}
