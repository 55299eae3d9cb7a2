//! HTTP token supplier backed by `reqwest`.

use std::time::Duration;

use parley_protocol::{Identity, SessionToken};
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;

use crate::{TokenFetchError, TokenSupplier};

/// Where to ask for tokens and how to authenticate the request.
#[derive(Debug, Clone)]
pub struct TokenEndpointConfig {
    /// Full URL of the token endpoint, e.g.
    /// `https://api.example.com/api/chat/token`.
    pub url: String,

    /// Bearer credential proving who is asking (usually the identity
    /// provider's session JWT). Sent as `Authorization: Bearer ..`.
    pub bearer: Option<String>,

    /// Per-request timeout enforced by the HTTP client.
    pub timeout: Duration,
}

impl TokenEndpointConfig {
    /// Creates a config with no bearer and a 10 second timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Reads `PARLEY_TOKEN_URL` and, optionally, `PARLEY_TOKEN_BEARER`.
    ///
    /// Returns `None` if the URL is unset.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("PARLEY_TOKEN_URL").ok()?;
        Some(Self {
            bearer: std::env::var("PARLEY_TOKEN_BEARER").ok(),
            ..Self::new(url)
        })
    }
}

/// The body the token endpoint answers with: `{"token": "..."}`.
#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// A [`TokenSupplier`] that GETs a token from your backend.
///
/// The request carries the user id as a `user_id` query parameter so the
/// endpoint can check it against the bearer credential.
///
/// | Response                       | Result                               |
/// |--------------------------------|--------------------------------------|
/// | 2xx with `{"token": "…"}`      | `Ok(token)`                          |
/// | 401 / 403                      | [`TokenFetchError::Unauthorized`]    |
/// | other non-2xx                  | [`TokenFetchError::Server`]          |
/// | 2xx without a non-empty token  | [`TokenFetchError::Malformed`]       |
/// | I/O failure                    | [`TokenFetchError::Network`]         |
pub struct HttpTokenSupplier {
    config: TokenEndpointConfig,
    client: Client,
}

impl HttpTokenSupplier {
    /// Builds the HTTP client.
    ///
    /// # Errors
    /// Returns [`TokenFetchError::Network`] if the bearer contains bytes
    /// that can't go in a header, or the TLS backend fails to initialize.
    pub fn new(config: TokenEndpointConfig) -> Result<Self, TokenFetchError> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref bearer) = config.bearer {
            let value = header::HeaderValue::from_str(&format!("Bearer {bearer}"))
                .map_err(|e| TokenFetchError::Network(format!("invalid bearer: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| TokenFetchError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }
}

impl TokenSupplier for HttpTokenSupplier {
    async fn fetch_token(
        &self,
        identity: &Identity,
    ) -> Result<SessionToken, TokenFetchError> {
        let response = self
            .client
            .get(&self.config.url)
            .query(&[("user_id", identity.id.as_str())])
            .send()
            .await
            .map_err(|e| TokenFetchError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TokenFetchError::Unauthorized {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TokenFetchError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(TokenFetchError::Server {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| TokenFetchError::Malformed(e.to_string()))?;

        match parsed.token {
            Some(token) if !token.is_empty() => {
                tracing::debug!(user_id = %identity.id, "session token issued");
                Ok(SessionToken::new(token))
            }
            _ => Err(TokenFetchError::Malformed(
                "response has no token".into(),
            )),
        }
    }
}
