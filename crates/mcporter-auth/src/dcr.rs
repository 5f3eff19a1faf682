//! OAuth 2.0 Dynamic Client Registration (RFC 7591).
//!
//! Grounded on the teacher's `turbomcp-auth::oauth2::dcr::DcrClient`, trimmed
//! to the single request shape an interactive loopback flow needs (no
//! initial-access-token auth, no registration-management PUT/DELETE).

use mcporter_core::{Result, RuntimeError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct RegistrationRequest<'a> {
    redirect_uris: [&'a str; 1],
    token_endpoint_auth_method: &'static str,
    grant_types: [&'static str; 2],
    response_types: [&'static str; 1],
    client_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
}

/// Client credentials issued by the authorization server.
#[derive(Debug, Clone)]
pub struct DcrCredentials {
    /// Issued client identifier.
    pub client_id: String,
    /// Issued client secret, for confidential-client registrations.
    pub client_secret: Option<String>,
}

/// Register a public, authorization-code-only client at `registration_endpoint`.
///
/// Credentials aren't persisted: each process that needs to run an
/// interactive flow against a server without a statically configured
/// `clientId` re-registers. Authorization servers that support RFC 7591
/// tolerate repeat registration from the same redirect URI; this keeps the
/// Runtime from needing a second on-disk cache next to the token cache.
pub async fn register_client(
    client: &reqwest::Client,
    registration_endpoint: &str,
    redirect_uri: &str,
    client_name: &str,
) -> Result<DcrCredentials> {
    let request = RegistrationRequest {
        redirect_uris: [redirect_uri],
        token_endpoint_auth_method: "none",
        grant_types: ["authorization_code", "refresh_token"],
        response_types: ["code"],
        client_name,
    };

    let response = client
        .post(registration_endpoint)
        .json(&request)
        .send()
        .await
        .map_err(|e| RuntimeError::TransportFailure(format!("client registration request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(RuntimeError::TransportFailure(format!(
            "client registration at {registration_endpoint} returned {}",
            response.status()
        )));
    }

    let body: RegistrationResponse = response
        .json()
        .await
        .map_err(|e| RuntimeError::TransportFailure(format!("malformed client registration response: {e}")))?;

    Ok(DcrCredentials {
        client_id: body.client_id,
        client_secret: body.client_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn registers_a_public_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "client_id": "generated-client-id",
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let creds = register_client(
            &client,
            &format!("{}/register", server.uri()),
            "http://127.0.0.1:9999/callback",
            "mcporter",
        )
        .await
        .unwrap();

        assert_eq!(creds.client_id, "generated-client-id");
        assert!(creds.client_secret.is_none());
    }

    #[tokio::test]
    async fn surfaces_a_transport_failure_on_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = register_client(
            &client,
            &format!("{}/register", server.uri()),
            "http://127.0.0.1:9999/callback",
            "mcporter",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RuntimeError::TransportFailure(_)));
    }
}
