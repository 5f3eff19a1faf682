//! Loopback OAuth 2.1 authorization-code flow with PKCE.
//!
//! Grounded on the teacher's `turbomcp-auth::oauth2::client::OAuth2Client`
//! (typestate `BasicClient`, PKCE challenge/verifier pair, stateful
//! `reqwest::Client` with redirects disabled). Unlike the teacher, this
//! session owns its own loopback HTTP listener (`tiny_http`) rather than
//! assuming a host web framework terminates the callback, since the
//! Runtime has no server of its own.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::SystemTime;

use mcporter_core::{Result, RuntimeError};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, TokenResponse, TokenUrl,
};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;

use crate::cache::TokenCache;
use crate::token::TokenInfo;

type FlowClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Static configuration needed to start an [`OAuthSession`].
pub struct OAuthSessionConfig {
    /// Provider's authorization endpoint.
    pub auth_url: String,
    /// Provider's token endpoint.
    pub token_url: String,
    /// OAuth client id, when one was statically configured. Definitions
    /// sourced from config files never carry one (spec.md §4.1 only lists
    /// `clientName`/`oauthRedirectUrl`); leave `None` to resolve one via
    /// [`crate::dcr`] on first [`OAuthSession::start`].
    pub client_id: Option<String>,
    /// OAuth client secret, for confidential clients. Public clients (the
    /// common case for CLI/desktop tools) leave this `None` and rely on
    /// PKCE alone.
    pub client_secret: Option<String>,
    /// Registration endpoint to resolve a client id from when `client_id`
    /// is `None` (RFC 7591, discovered alongside the authorization and
    /// token endpoints).
    pub registration_endpoint: Option<String>,
    /// Human-readable client name presented during dynamic registration.
    pub client_name: String,
    /// Fixed redirect URL, overriding the default
    /// `http://127.0.0.1:<ephemeral-port>/callback`.
    pub redirect_url_override: Option<String>,
    /// Directory tokens are persisted to (`ServerDefinition::token_cache_dir`).
    pub cache_dir: std::path::PathBuf,
}

struct PendingListener {
    server: Arc<tiny_http::Server>,
    client: FlowClient,
    pkce_verifier: String,
    csrf_state: String,
}

/// One server's OAuth session: listener + PKCE state while a flow is in
/// flight, and a cached token once the flow (or a prior run) has completed.
pub struct OAuthSession {
    auth_url: AuthUrl,
    token_url: TokenUrl,
    client_id: TokioMutex<Option<ClientId>>,
    client_secret: TokioMutex<Option<ClientSecret>>,
    registration_endpoint: Option<String>,
    client_name: String,
    redirect_override: Option<String>,
    http_client: reqwest::Client,
    cache: TokenCache,
    pending: StdMutex<Option<PendingListener>>,
    token: TokioMutex<Option<TokenInfo>>,
}

impl OAuthSession {
    /// Validate `config` and build a session with no listener bound yet.
    pub fn new(config: OAuthSessionConfig) -> Result<Self> {
        let auth_url = AuthUrl::new(config.auth_url)
            .map_err(|e| RuntimeError::TransportFailure(format!("invalid OAuth authorize URL: {e}")))?;
        let token_url = TokenUrl::new(config.token_url)
            .map_err(|e| RuntimeError::TransportFailure(format!("invalid OAuth token URL: {e}")))?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RuntimeError::TransportFailure(format!("failed to build OAuth http client: {e}")))?;

        Ok(Self {
            auth_url,
            token_url,
            client_id: TokioMutex::new(config.client_id.map(ClientId::new)),
            client_secret: TokioMutex::new(config.client_secret.map(ClientSecret::new)),
            registration_endpoint: config.registration_endpoint,
            client_name: config.client_name,
            redirect_override: config.redirect_url_override,
            http_client,
            cache: TokenCache::new(config.cache_dir),
            pending: StdMutex::new(None),
            token: TokioMutex::new(None),
        })
    }

    /// The configured or previously dynamically-registered client id and
    /// secret, registering one via [`crate::dcr`] at `redirect` if neither
    /// was ever set.
    ///
    /// Registration credentials are resolved once per process and reused
    /// for the rest of this session's lifetime (not persisted — see the
    /// module doc on [`crate::dcr::register_client`]).
    async fn resolve_client_credentials(&self, redirect: &str) -> Result<(ClientId, Option<ClientSecret>)> {
        if let Some(id) = self.client_id.lock().await.as_ref() {
            return Ok((id.clone(), self.client_secret.lock().await.clone()));
        }

        let endpoint = self.registration_endpoint.as_ref().ok_or_else(|| {
            RuntimeError::TransportFailure(
                "server has no statically configured client id and advertises no registration endpoint".into(),
            )
        })?;
        let creds = crate::dcr::register_client(&self.http_client, endpoint, redirect, &self.client_name).await?;

        let id = ClientId::new(creds.client_id);
        let secret = creds.client_secret.map(ClientSecret::new);
        *self.client_id.lock().await = Some(id.clone());
        *self.client_secret.lock().await = secret.clone();
        Ok((id, secret))
    }

    /// Binds a loopback listener on an ephemeral port, builds the
    /// authorization URL with PKCE, and opens the user's browser — falling
    /// back to logging the URL if no browser could be launched.
    pub async fn start(&self) -> Result<String> {
        let server = tiny_http::Server::http("127.0.0.1:0")
            .map_err(|e| RuntimeError::TransportFailure(format!("failed to bind OAuth loopback listener: {e}")))?;
        let port = server.server_addr().to_ip().map(|addr| addr.port()).ok_or_else(|| {
            RuntimeError::TransportFailure("loopback listener did not report an IP address".into())
        })?;

        let redirect = self
            .redirect_override
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}/callback"));
        let redirect_url = RedirectUrl::new(redirect.clone())
            .map_err(|e| RuntimeError::TransportFailure(format!("invalid OAuth redirect URL: {e}")))?;

        let (client_id, client_secret) = self.resolve_client_credentials(&redirect).await?;
        let mut client = BasicClient::new(client_id)
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(redirect_url);
        if let Some(secret) = &client_secret {
            client = client.set_client_secret(secret.clone());
        }

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let csrf_state = CsrfToken::new_random().secret().clone();
        let (authorize_url, _csrf) = client
            .authorize_url(|| CsrfToken::new(csrf_state.clone()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        *self.pending.lock().unwrap() = Some(PendingListener {
            server: Arc::new(server),
            client,
            pkce_verifier: pkce_verifier.secret().clone(),
            csrf_state,
        });

        let url = authorize_url.to_string();
        if webbrowser::open(&url).is_err() {
            tracing::info!(authorize_url = %url, "could not launch a browser; open this URL to finish authorizing");
        }
        Ok(url)
    }

    /// Blocks until the loopback listener receives the provider's callback,
    /// validating the CSRF state and returning the authorization code.
    ///
    /// Races the blocking receive against `cancellation`: if the caller
    /// cancels first, the listener is unblocked the same way [`Self::close`]
    /// releases it, and this returns `Timeout` without waiting for a
    /// callback that may never arrive.
    pub async fn wait_for_authorization_code(&self, cancellation: &CancellationToken) -> Result<String> {
        let (server, expected_state) = {
            let guard = self.pending.lock().unwrap();
            let pending = guard
                .as_ref()
                .ok_or_else(|| RuntimeError::TransportFailure("OAuth session was not started".into()))?;
            (pending.server.clone(), pending.csrf_state.clone())
        };

        let recv_task = tokio::task::spawn_blocking({
            let server = server.clone();
            move || server.recv()
        });

        let request = tokio::select! {
            result = recv_task => {
                result
                    .map_err(|e| RuntimeError::TransportFailure(format!("OAuth listener task panicked: {e}")))?
                    .map_err(|e| RuntimeError::TransportFailure(format!("OAuth loopback listener error: {e}")))?
            }
            () = cancellation.cancelled() => {
                server.unblock();
                return Err(RuntimeError::Timeout);
            }
        };

        let full_url = format!("http://127.0.0.1{}", request.url());
        let parsed = url::Url::parse(&full_url)
            .map_err(|e| RuntimeError::TransportFailure(format!("malformed OAuth callback URL: {e}")))?;
        let params: std::collections::HashMap<String, String> =
            parsed.query_pairs().into_owned().collect();

        let body = "<html><body>Authorization complete, you can close this tab.</body></html>";
        let response = tiny_http::Response::from_string(body).with_header(
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]).unwrap(),
        );
        let _ = request.respond(response);

        if params.get("state").map(String::as_str) != Some(expected_state.as_str()) {
            return Err(RuntimeError::Unauthorized(
                "OAuth callback state did not match the authorization request".into(),
            ));
        }

        params
            .get("code")
            .cloned()
            .ok_or_else(|| RuntimeError::Unauthorized("OAuth callback did not include an authorization code".into()))
    }

    /// Exchanges `code` for tokens using the PKCE verifier from [`Self::start`],
    /// persisting the result to the token cache.
    pub async fn exchange_code(&self, code: String) -> Result<()> {
        let (client, verifier) = {
            let guard = self.pending.lock().unwrap();
            let pending = guard
                .as_ref()
                .ok_or_else(|| RuntimeError::TransportFailure("OAuth session was not started".into()))?;
            (pending.client.clone(), pending.pkce_verifier.clone())
        };

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(verifier))
            .request_async(&self.http_client)
            .await
            .map_err(|e| RuntimeError::Unauthorized(format!("OAuth token exchange failed: {e}")))?;

        let token = TokenInfo::from_expires_in(
            response.access_token().secret().clone(),
            response.refresh_token().map(|t| t.secret().clone()),
            response.expires_in().map(|d| d.as_secs()),
            SystemTime::now(),
        );
        self.cache.store(&token)?;
        *self.token.lock().await = Some(token);
        Ok(())
    }

    /// Refreshes the cached access token using the cached refresh token.
    /// Returns `Unauthorized` when no refresh token or no running flow's
    /// client is available — callers treat that as "run the interactive
    /// flow again".
    async fn refresh(&self, current: &TokenInfo) -> Result<TokenInfo> {
        let refresh_token = current
            .refresh_token
            .clone()
            .ok_or_else(|| RuntimeError::Unauthorized("access token expired and no refresh token is cached".into()))?;

        let client = {
            let guard = self.pending.lock().unwrap();
            guard.as_ref().map(|p| p.client.clone())
        }
        .ok_or_else(|| RuntimeError::Unauthorized("no OAuth client available to refresh the access token".into()))?;

        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| RuntimeError::Unauthorized(format!("OAuth token refresh failed: {e}")))?;

        let refreshed = TokenInfo::from_expires_in(
            response.access_token().secret().clone(),
            response
                .refresh_token()
                .map(|t| t.secret().clone())
                .or(Some(refresh_token)),
            response.expires_in().map(|d| d.as_secs()),
            SystemTime::now(),
        );
        self.cache.store(&refreshed)?;
        Ok(refreshed)
    }

    /// The current bearer token, refreshing it first if expired. Loads from
    /// the on-disk cache on first use within a process.
    ///
    /// Exposed to other crates only through [`crate::provider::TokenProvider`];
    /// kept as an inherent method under a different name so the trait impl
    /// has something distinct to delegate to.
    pub(crate) async fn bearer_token_inner(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if guard.is_none() {
            *guard = self.cache.load()?;
        }

        let needs_refresh = match guard.as_ref() {
            Some(token) => token.is_expired(SystemTime::now()),
            None => true,
        };
        if needs_refresh {
            let current = guard.clone().ok_or_else(|| {
                RuntimeError::Unauthorized("no cached OAuth token; run the authorization flow first".into())
            })?;
            *guard = Some(self.refresh(&current).await?);
        }

        guard
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| RuntimeError::Unauthorized("no OAuth token available".into()))
    }

    /// Tears down the listener, if one is bound. Idempotent.
    pub fn close(&self) {
        if let Some(pending) = self.pending.lock().unwrap().take() {
            pending.server.unblock();
        }
    }
}
