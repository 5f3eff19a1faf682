//! Token shapes persisted to and loaded from the token cache.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// An access/refresh token pair, as returned by the authorization-code
/// exchange or a refresh, with an absolute expiry so cache reloads don't
/// need to remember when the token was issued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenInfo {
    /// Bearer access token attached to outgoing requests.
    pub access_token: String,
    /// Refresh token, when the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) after which `access_token` must be refreshed
    /// before use. `None` means the provider reported no expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl TokenInfo {
    /// Build from an exchange/refresh response's `expires_in` duration,
    /// stamping an absolute `expires_at` relative to `now`.
    pub fn from_expires_in(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
        now: SystemTime,
    ) -> Self {
        let expires_at = expires_in.map(|secs| {
            now.duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
                + secs
        });
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// `true` once `now` has passed `expires_at`. A token with no recorded
    /// expiry is never considered expired by this check alone.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                now.duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs()
                    >= expires_at
            }
            None => false,
        }
    }
}
