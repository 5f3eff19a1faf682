//! The capability a transport must expose to participate in the Connect
//! Orchestrator's auth retry loop (spec.md §4.7, state `S4`).

use async_trait::async_trait;
use mcporter_core::Result;

/// Transports that can complete an OAuth authorization-code exchange.
///
/// Stdio transports never implement this — OAuth only applies to HTTP-family
/// transports (spec.md §4.7, state `S0` dispatches stdio before OAuth ever
/// enters the picture). A transport lacking this capability surfaces
/// `OAuthUnsupportedByTransport` if the orchestrator ever reaches `S4` for it.
#[async_trait]
pub trait FinishAuth: Send + Sync {
    /// Exchange an authorization code obtained out-of-band and make the
    /// resulting token available to subsequent requests on this transport.
    async fn finish_auth(&self, code: String) -> Result<()>;
}
