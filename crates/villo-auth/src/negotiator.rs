//! Token issuance and refresh exchanges against the discovered auth host.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bundle::DEFAULT_TIMEOUT;
use crate::discovery::ClientConfig;
use crate::error::{AuthError, Result};

/// Access/refresh token pair returned by issuance.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Performs the two token exchanges.
#[async_trait]
pub trait TokenNegotiator: Send + Sync + fmt::Debug {
    /// Obtain an initial token pair with the client credentials.
    async fn issue(&self, client: &ClientConfig) -> Result<TokenPair>;

    /// Obtain a new access token. The refresh token is not rotated.
    async fn refresh(&self, auth_host: &str, refresh_token: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ClientTokenRequest<'a> {
    code: &'a str,
    key: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// [`TokenNegotiator`] speaking the Cyclocity JSON exchange over HTTP.
#[derive(Debug, Clone)]
pub struct HttpNegotiator {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpNegotiator {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<TokenResponse> {
        tracing::debug!(url, "POSTing token exchange");
        let response = self
            .http
            .post(url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AuthError::TokenExchange(format!("failed to read response from {}: {}", url, e))
        })?;

        if !status.is_success() {
            return Err(AuthError::TokenExchange(format!(
                "{} returned HTTP {}: {}",
                url, status, text
            )));
        }
        if text.trim().is_empty() {
            return Err(AuthError::TokenExchange(format!("{} returned an empty body", url)));
        }

        let parsed: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            AuthError::TokenExchange(format!("unparseable response from {}: {}", url, e))
        })?;
        tracing::debug!(url, status = %status, "Token exchange response received");
        Ok(parsed)
    }
}

#[async_trait]
impl TokenNegotiator for HttpNegotiator {
    async fn issue(&self, client: &ClientConfig) -> Result<TokenPair> {
        let url = format!(
            "{}/environments/{}/client_tokens",
            client.auth_host.trim_end_matches('/'),
            client.env
        );
        let body = ClientTokenRequest {
            code: &client.client_code,
            key: &client.client_key,
        };

        let response = self.post(&url, &body).await?;
        let access_token = required(response.access_token, "accessToken", &url)?;
        let refresh_token = required(response.refresh_token, "refreshToken", &url)?;

        tracing::info!(auth_host = %client.auth_host, "Client tokens issued");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    async fn refresh(&self, auth_host: &str, refresh_token: &str) -> Result<String> {
        let url = format!("{}/access_tokens", auth_host.trim_end_matches('/'));
        let body = AccessTokenRequest { refresh_token };

        let response = self.post(&url, &body).await?;
        let access_token = required(response.access_token, "accessToken", &url)?;

        tracing::info!(auth_host, "Access token refreshed");
        Ok(access_token)
    }
}

fn required(value: Option<String>, field: &str, url: &str) -> Result<String> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        AuthError::TokenExchange(format!("response from {} has no '{}'", url, field))
    })
}
