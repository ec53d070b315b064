//! Error types for credential discovery and token handling.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors raised while discovering credentials or managing the session.
///
/// None of these are recoverable: each one means an assumption about the
/// target site no longer holds.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Landing page or a fragment could not be fetched, or the page
    /// references no fragment at all.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// No fragment yields a complete configuration object.
    #[error("Configuration not found: {0}")]
    ConfigNotFound(String),

    /// Token issuance or refresh failed or returned an unusable body.
    #[error("Token exchange error: {0}")]
    TokenExchange(String),

    /// Access token cannot be segmented, decoded, decompressed or parsed.
    #[error("Malformed token: {0}")]
    MalformedToken(String),
}

impl AuthError {
    /// Short category name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Discovery(_) => "discovery",
            AuthError::ConfigNotFound(_) => "config_not_found",
            AuthError::TokenExchange(_) => "token_exchange",
            AuthError::MalformedToken(_) => "malformed_token",
        }
    }
}
