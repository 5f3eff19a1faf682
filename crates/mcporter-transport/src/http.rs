//! Streamable HTTP transport (C5): request/response carried as a single
//! POST whose body is either a JSON object or a `text/event-stream`
//! response, per MCP's 2025-06-18 streamable-HTTP transport.
//!
//! Grounded on `streamable_http_client::StreamableHttpClientTransport`'s
//! Accept-header negotiation and `Mcp-Session-Id` handling, trimmed to the
//! request shapes this Runtime actually issues (no resumable
//! `Last-Event-ID` reconnect, since the orchestrator's own fallback to SSE
//! already covers long-lived streaming).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use mcporter_auth::OAuthSession;
use mcporter_config::placeholder;
use mcporter_core::{Result, RuntimeError};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex as TokioMutex};

use crate::finish_auth::FinishAuth;
use mcporter_wire::Transport;

const SESSION_HEADER: &str = "Mcp-Session-Id";
const INBOX_CAPACITY: usize = 64;

/// Which client class this transport presents itself as. Both modes POST
/// JSON-RPC and accept either response shape; the distinction is the
/// `Accept` header and log/error labeling, matching the orchestrator's
/// streamable-then-SSE fallback (spec.md §4.7) treating them as separate
/// attempts against the same endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpTransportMode {
    /// Tried first by the orchestrator (`S1 TryStreamable`).
    Streamable,
    /// Fallback tried by the orchestrator (`S2 FallbackSSE`).
    Sse,
}

impl HttpTransportMode {
    fn accept_header(self) -> &'static str {
        match self {
            HttpTransportMode::Streamable => "application/json, text/event-stream",
            HttpTransportMode::Sse => "text/event-stream, application/json",
        }
    }
}

/// A streamable-HTTP or SSE MCP session (spec.md §4.5: "sse: same as http
/// streamable but uses the SSE client class").
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
    oauth: Option<Arc<OAuthSession>>,
    mode: HttpTransportMode,
    session_id: TokioMutex<Option<String>>,
    inbox_tx: mpsc::Sender<Value>,
    inbox_rx: TokioMutex<mpsc::Receiver<Value>>,
    /// The SSE event-pump task spawned by the most recent `send()`, if the
    /// response was a `text/event-stream`. Replaced (aborting the previous
    /// one) rather than accumulated, since each `send()` opens its own
    /// stream.
    sse_task: TokioMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl HttpTransport {
    /// Build a transport targeting `url`. `headers` carries unresolved
    /// placeholder templates, resolved lazily on every request (late
    /// binding, per spec.md §4.5).
    pub fn new(
        url: String,
        headers: HashMap<String, String>,
        oauth: Option<Arc<OAuthSession>>,
        mode: HttpTransportMode,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RuntimeError::TransportFailure(format!("failed to build HTTP client: {e}")))?;
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        Ok(Self {
            client,
            url,
            headers,
            oauth,
            mode,
            session_id: TokioMutex::new(None),
            inbox_tx,
            inbox_rx: TokioMutex::new(inbox_rx),
            sse_task: TokioMutex::new(None),
        })
    }

    async fn build_request(&self, message: &Value) -> Result<reqwest::RequestBuilder> {
        let mut request = self
            .client
            .post(&self.url)
            .header(ACCEPT, self.mode.accept_header())
            .json(message);

        for (name, template) in &self.headers {
            request = request.header(name, placeholder::resolve(template)?);
        }
        if let Some(oauth) = &self.oauth {
            let token = mcporter_auth::TokenProvider::bearer_token(oauth.as_ref()).await?;
            request = request.bearer_auth(token);
        }
        if let Some(session_id) = self.session_id.lock().await.clone() {
            request = request.header(SESSION_HEADER, session_id);
        }
        Ok(request)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, message: Value) -> Result<()> {
        let request = self.build_request(&message).await?;
        let response = request
            .send()
            .await
            .map_err(|e| RuntimeError::TransportFailure(format!("HTTP request failed: {e}")))?;

        if let Some(session_id) = response.headers().get(SESSION_HEADER) {
            if let Ok(value) = session_id.to_str() {
                *self.session_id.lock().await = Some(value.to_string());
            }
        }

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RuntimeError::Unauthorized(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(RuntimeError::TransportFailure(format!("HTTP {status}")));
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));

        if is_event_stream {
            let tx = self.inbox_tx.clone();
            let mut stream = response.bytes_stream().eventsource();
            let task = tokio::spawn(async move {
                while let Some(event) = stream.next().await {
                    let Ok(event) = event else { break };
                    if let Ok(value) = serde_json::from_str::<Value>(&event.data) {
                        if tx.send(value).await.is_err() {
                            break;
                        }
                    }
                }
            });
            if let Some(previous) = self.sse_task.lock().await.replace(task) {
                previous.abort();
            }
        } else {
            let value: Value = response
                .json()
                .await
                .map_err(|e| RuntimeError::TransportFailure(format!("malformed JSON response: {e}")))?;
            self.inbox_tx
                .send(value)
                .await
                .map_err(|_| RuntimeError::TransportFailure("HTTP transport inbox closed".into()))?;
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Value> {
        self.inbox_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| RuntimeError::TransportFailure("HTTP transport closed".into()))
    }

    async fn close(&self) -> Result<()> {
        if let Some(task) = self.sse_task.lock().await.take() {
            task.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl FinishAuth for HttpTransport {
    async fn finish_auth(&self, code: String) -> Result<()> {
        let oauth = self
            .oauth
            .as_ref()
            .ok_or(RuntimeError::OAuthUnsupportedByTransport)?;
        oauth.exchange_code(code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_request_resolves_header_placeholders() {
        std::env::set_var("MCPORTER_TEST_HTTP_TOKEN", "secret");
        let mut headers = HashMap::new();
        headers.insert("X-Api-Key".to_string(), "${MCPORTER_TEST_HTTP_TOKEN}".to_string());

        let transport =
            HttpTransport::new("https://example.test/mcp".into(), headers, None, HttpTransportMode::Streamable)
                .unwrap();
        let request = transport
            .build_request(&serde_json::json!({"jsonrpc": "2.0"}))
            .await
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            request.headers().get("X-Api-Key").unwrap().to_str().unwrap(),
            "secret"
        );
    }

    #[tokio::test]
    async fn close_aborts_the_sse_pump_task() {
        let transport = HttpTransport::new(
            "https://example.test/mcp".into(),
            HashMap::new(),
            None,
            HttpTransportMode::Sse,
        )
        .unwrap();

        let task = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        *transport.sse_task.lock().await = Some(task);

        transport.close().await.unwrap();
        tokio::task::yield_now().await;

        assert!(transport.sse_task.lock().await.is_none());
    }

    #[tokio::test]
    async fn finish_auth_without_oauth_is_unsupported() {
        let transport = HttpTransport::new(
            "https://example.test/mcp".into(),
            HashMap::new(),
            None,
            HttpTransportMode::Streamable,
        )
        .unwrap();
        let err = transport.finish_auth("code".into()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::OAuthUnsupportedByTransport));
    }
}
