//! The capability HTTP transports consume to attach `Authorization: Bearer`
//! headers without knowing anything about OAuth flows or token caches.

use async_trait::async_trait;
use mcporter_core::Result;

use crate::session::OAuthSession;

/// Supplies a bearer token for outgoing requests, refreshing transparently.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The current access token, refreshed first if expired.
    async fn bearer_token(&self) -> Result<String>;
}

#[async_trait]
impl TokenProvider for OAuthSession {
    async fn bearer_token(&self) -> Result<String> {
        self.bearer_token_inner().await
    }
}
