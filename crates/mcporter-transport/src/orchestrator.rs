//! Connect Orchestrator (C7): the protocol state machine that tries
//! streamable HTTP, falls back to SSE, promotes an anonymous ad-hoc HTTP
//! definition to OAuth on a 401/403, and retries after completing an
//! interactive authorization.
//!
//! No single teacher file owns this — the teacher leaves transport
//! selection to its MCP SDK dependency. Composed from
//! [`mcporter_wire::JsonRpcClient`], [`crate::stdio::StdioTransport`],
//! [`crate::http::HttpTransport`], and [`mcporter_auth::OAuthSession`].

use std::sync::Arc;

use async_trait::async_trait;
use mcporter_auth::{OAuthSession, OAuthSessionConfig};
use mcporter_core::definition::{AuthMode, CommandSpec, ServerDefinition};
use mcporter_core::{Result, RuntimeError};
use mcporter_wire::{JsonRpcClient, Transport};
use tokio_util::sync::CancellationToken;

use crate::finish_auth::FinishAuth;
use crate::http::{HttpTransport, HttpTransportMode};
use crate::stdio::StdioTransport;

/// `maxOAuthAttempts` default (spec.md §4.7): up to this many interactive
/// authorization round-trips per `connect` call before surfacing the
/// original error. `0` disables interactive OAuth entirely, the setting
/// `listTools(autoAuthorize: false)` uses.
pub const DEFAULT_MAX_OAUTH_ATTEMPTS: u32 = 3;

/// Options governing one `connect` attempt.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// Caps interactive OAuth round-trips; `0` disables them.
    pub max_oauth_attempts: u32,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_oauth_attempts: DEFAULT_MAX_OAUTH_ATTEMPTS,
        }
    }
}

/// A live MCP session plus whatever auxiliary state its teardown needs.
pub struct Connection {
    /// The typed JSON-RPC client, generic over a boxed transport so stdio
    /// and HTTP-family connections share one shape.
    pub client: JsonRpcClient<Arc<dyn Transport>>,
    oauth: Option<Arc<OAuthSession>>,
}

impl Connection {
    /// Close the client, then the OAuth session's listener, ignoring
    /// individual failures (spec.md §4.9: "must dispose... ignoring
    /// individual failures").
    pub async fn close(&self) {
        let _ = self.client.close().await;
        if let Some(oauth) = &self.oauth {
            oauth.close();
        }
    }
}

/// Callback the orchestrator uses to persist an OAuth-promoted definition
/// back into the caller's registry (spec.md §4.7, `S3 MaybePromote`:
/// "atomically replace D in the definition registry"). Kept as a trait
/// rather than a direct dependency on `mcporter-runtime` so this crate
/// doesn't depend on its own downstream consumer.
#[async_trait]
pub trait PromotionSink: Send + Sync {
    /// Replace the active definition for `promoted.name` with `promoted`.
    async fn promote(&self, promoted: ServerDefinition);
}

/// A [`PromotionSink`] that does nothing, for callers (such as the ephemeral
/// `listTools(autoAuthorize: false)` path) that never persist a promotion.
pub struct NoopPromotionSink;

#[async_trait]
impl PromotionSink for NoopPromotionSink {
    async fn promote(&self, _promoted: ServerDefinition) {}
}

/// Drive `definition` through the connect state machine, returning a live
/// [`Connection`] or the error that survived every fallback.
///
/// `cancellation` is threaded down to the OAuth auth-retry loop: cancelling
/// it while a browser flow is pending releases the loopback listener instead
/// of blocking `connect` until the caller finishes (or abandons) the flow.
pub async fn connect(
    definition: &ServerDefinition,
    client_name: &str,
    options: ConnectOptions,
    promotion: &dyn PromotionSink,
    cancellation: &CancellationToken,
) -> Result<Connection> {
    // S0 Dispatch: stdio bypasses OAuth and transport fallback entirely.
    if let CommandSpec::Stdio { command, args, cwd } = &definition.command {
        let env = definition.env.clone().unwrap_or_default();
        let transport = StdioTransport::spawn(command, args, cwd, &env).await?;
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let client = JsonRpcClient::new(transport);
        client.initialize(client_name).await?;
        return Ok(Connection { client, oauth: None });
    }

    let mut active = definition.clone();
    let mut promoted = false;

    loop {
        match try_http(&active, client_name, HttpTransportMode::Streamable, options.max_oauth_attempts, cancellation)
            .await
        {
            Ok(connection) => return Ok(connection),
            Err(streamable_err) => {
                if streamable_err.looks_unauthorized() {
                    if !promoted && is_promotable(&active) {
                        active = promote(&active, promotion).await;
                        promoted = true;
                        continue;
                    }
                    return Err(streamable_err);
                }

                // S2 FallbackSSE
                match try_http(&active, client_name, HttpTransportMode::Sse, options.max_oauth_attempts, cancellation)
                    .await
                {
                    Ok(connection) => return Ok(connection),
                    Err(sse_err) => {
                        if sse_err.looks_unauthorized() && !promoted && is_promotable(&active) {
                            active = promote(&active, promotion).await;
                            promoted = true;
                            continue;
                        }
                        tracing::debug!(
                            server = %active.name,
                            streamable_error = %streamable_err,
                            "streamable HTTP failed before SSE fallback"
                        );
                        return Err(sse_err);
                    }
                }
            }
        }
    }
}

/// `S3 MaybePromote` eligibility: only ad-hoc HTTP definitions not already
/// on OAuth are candidates (spec.md §4.7).
fn is_promotable(definition: &ServerDefinition) -> bool {
    definition.source.is_adhoc() && definition.command.is_http() && definition.auth != Some(AuthMode::OAuth)
}

async fn promote(definition: &ServerDefinition, promotion: &dyn PromotionSink) -> ServerDefinition {
    let promoted = definition.promoted_to_oauth();
    promotion.promote(promoted.clone()).await;
    promoted
}

/// One streamable-or-SSE connect attempt, including its own `S4
/// AuthRetryLoop`: on `Unauthorized` with an OAuth session in play, wait for
/// an authorization code, hand it to the transport, and retry up to
/// `max_oauth_attempts` times.
async fn try_http(
    definition: &ServerDefinition,
    client_name: &str,
    mode: HttpTransportMode,
    max_oauth_attempts: u32,
    cancellation: &CancellationToken,
) -> Result<Connection> {
    let CommandSpec::Http { url, headers } = &definition.command else {
        unreachable!("caller only reaches try_http with an HTTP command spec");
    };

    let oauth = if definition.auth == Some(AuthMode::OAuth) {
        Some(Arc::new(build_oauth_session(definition, url).await?))
    } else {
        None
    };

    let mut attempts_used = 0;
    loop {
        let http = Arc::new(HttpTransport::new(url.clone(), headers.clone(), oauth.clone(), mode)?);
        let transport: Arc<dyn Transport> = http.clone();
        let client = JsonRpcClient::new(transport);

        match client.initialize(client_name).await {
            Ok(_) => return Ok(Connection { client, oauth }),
            Err(err) if err.looks_unauthorized() => {
                let Some(session) = &oauth else { return Err(err) };
                if attempts_used >= max_oauth_attempts {
                    return Err(err);
                }
                attempts_used += 1;

                session.start().await?;
                let code = session.wait_for_authorization_code(cancellation).await?;
                http.finish_auth(code).await?;
                // Loop: rebuild the transport so the new bearer token is
                // attached fresh rather than reusing a session that may
                // have already failed to authenticate a request.
            }
            Err(err) => return Err(err),
        }
    }
}

async fn build_oauth_session(definition: &ServerDefinition, url: &str) -> Result<OAuthSession> {
    let discovery_client = reqwest::Client::new();
    let endpoints = mcporter_auth::discover(&discovery_client, url).await?;

    let cache_dir = definition
        .token_cache_dir
        .clone()
        .or_else(|| ServerDefinition::default_token_cache_dir(&definition.name))
        .ok_or_else(|| RuntimeError::TransportFailure("could not determine a token cache directory".into()))?;

    OAuthSession::new(OAuthSessionConfig {
        auth_url: endpoints.auth_url,
        token_url: endpoints.token_url,
        client_id: None,
        client_secret: None,
        registration_endpoint: endpoints.registration_endpoint,
        client_name: definition.client_name.clone().unwrap_or_else(|| "mcporter".to_string()),
        redirect_url_override: definition.oauth_redirect_url.clone(),
        cache_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcporter_core::definition::DefinitionSource;
    use std::collections::HashMap;

    fn adhoc_http(name: &str, auth: Option<AuthMode>) -> ServerDefinition {
        ServerDefinition {
            name: name.to_string(),
            description: None,
            command: CommandSpec::Http {
                url: "https://example.test/mcp".into(),
                headers: HashMap::new(),
            },
            env: None,
            auth,
            token_cache_dir: None,
            client_name: None,
            oauth_redirect_url: None,
            source: DefinitionSource::adhoc(),
        }
    }

    #[test]
    fn ad_hoc_anonymous_http_is_promotable() {
        assert!(is_promotable(&adhoc_http("x", None)));
    }

    #[test]
    fn already_oauth_definitions_are_not_promotable() {
        assert!(!is_promotable(&adhoc_http("x", Some(AuthMode::OAuth))));
    }

    #[test]
    fn non_adhoc_definitions_are_not_promotable() {
        let mut def = adhoc_http("x", None);
        def.source = DefinitionSource::Local {
            path: "/etc/mcporter.json".into(),
        };
        assert!(!is_promotable(&def));
    }

    #[tokio::test]
    async fn stdio_dispatch_bypasses_oauth_entirely() {
        let def = ServerDefinition {
            name: "echo".into(),
            description: None,
            command: CommandSpec::Stdio {
                command: "cat".into(),
                args: vec![],
                cwd: std::env::temp_dir(),
            },
            env: None,
            auth: None,
            token_cache_dir: None,
            client_name: None,
            oauth_redirect_url: None,
            source: DefinitionSource::adhoc(),
        };

        let connection = connect(
            &def,
            "mcporter-tests",
            ConnectOptions::default(),
            &NoopPromotionSink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        connection.close().await;
    }
}
