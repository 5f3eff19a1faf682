//! OAuth Authorization Server Metadata discovery (RFC 8414).
//!
//! Grounded on the teacher's `turbomcp-auth::discovery::fetcher::DiscoveryFetcher`,
//! trimmed to a single well-known lookup with no OIDC fallback, SSRF
//! validator, or response caching — this Runtime only discovers servers an
//! operator already named in a definition, never arbitrary third-party
//! issuers reachable from request bodies.

use mcporter_core::{Result, RuntimeError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct AuthorizationServerMetadata {
    authorization_endpoint: String,
    token_endpoint: String,
    #[serde(default)]
    registration_endpoint: Option<String>,
}

/// The endpoints an [`crate::session::OAuthSessionConfig`] needs, plus an
/// optional Dynamic Client Registration endpoint (RFC 7591).
#[derive(Debug, Clone)]
pub struct DiscoveredEndpoints {
    /// Authorization endpoint.
    pub auth_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Registration endpoint, when the server advertises one.
    pub registration_endpoint: Option<String>,
}

/// Fetch `<scheme>://<host>[:port]/.well-known/oauth-authorization-server`
/// relative to `server_url` and extract the fields an authorization-code
/// flow needs.
pub async fn discover(client: &reqwest::Client, server_url: &str) -> Result<DiscoveredEndpoints> {
    let parsed = url::Url::parse(server_url)
        .map_err(|e| RuntimeError::TransportFailure(format!("invalid MCP server URL: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| RuntimeError::TransportFailure("MCP server URL has no host".into()))?;
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    let well_known = format!(
        "{}://{host}{port}/.well-known/oauth-authorization-server",
        parsed.scheme()
    );

    let response = client.get(&well_known).send().await.map_err(|e| {
        RuntimeError::TransportFailure(format!("OAuth discovery request to {well_known} failed: {e}"))
    })?;
    if !response.status().is_success() {
        return Err(RuntimeError::TransportFailure(format!(
            "OAuth discovery at {well_known} returned {}",
            response.status()
        )));
    }

    let metadata: AuthorizationServerMetadata = response.json().await.map_err(|e| {
        RuntimeError::TransportFailure(format!("malformed OAuth discovery document from {well_known}: {e}"))
    })?;

    Ok(DiscoveredEndpoints {
        auth_url: metadata.authorization_endpoint,
        token_url: metadata.token_endpoint,
        registration_endpoint: metadata.registration_endpoint,
    })
}
