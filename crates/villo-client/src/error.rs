//! Client error types.

use thiserror::Error;
use villo_auth::AuthError;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Discovery, token exchange or token decoding failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A data call failed: transport error, non-2xx status or a body that
    /// is not a JSON array.
    #[error("API call to {endpoint} failed: {message}")]
    ApiCall {
        /// Endpoint URL without query string.
        endpoint: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// What went wrong.
        message: String,
    },

    /// Invalid client configuration (builder misuse).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if a required configuration object was never discovered.
    pub fn is_config_not_found(&self) -> bool {
        matches!(self, Error::Auth(AuthError::ConfigNotFound(_)))
    }

    /// Check if this is an authentication failure reported by the API.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::ApiCall { status: Some(401 | 403), .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::ApiCall { status: Some(s), .. } if *s >= 500)
    }

    /// A discovered endpoint that is not a usable URL.
    pub(crate) fn bad_endpoint(endpoint: &str, reason: impl std::fmt::Display) -> Self {
        Error::ApiCall {
            endpoint: endpoint.to_string(),
            status: None,
            message: format!("discovered endpoint is not a usable URL: {}", reason),
        }
    }

    pub(crate) fn api_call(endpoint: &url::Url, status: Option<u16>, message: impl Into<String>) -> Self {
        let mut endpoint = endpoint.clone();
        endpoint.set_query(None);
        Error::ApiCall {
            endpoint: endpoint.to_string(),
            status,
            message: message.into(),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
