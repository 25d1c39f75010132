//! Error types for the auth session coordinator

use thiserror::Error;

/// Main error type for provider calls and coordinator plumbing
#[derive(Error, Debug)]
pub enum AuthError {
    /// A required configuration value is absent (endpoint URL, API key, ...)
    #[error("Missing configuration: {0} is not set")]
    MissingConfig(&'static str),

    /// A configuration value is present but unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The identity provider rejected or failed an operation
    #[error("Provider error: {0}")]
    Provider(String),

    /// Network failure while talking to the identity provider
    #[error("Network error: {0}")]
    Network(String),

    /// The provider refused to complete a redirect (consumed code, state mismatch, ...)
    #[error("Redirect rejected: {0}")]
    RedirectRejected(String),

    /// The upstream session status stream failed
    #[error("Session status stream lost: {0}")]
    StreamLost(String),

    /// JSON decode error (configuration payloads)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Callback URI could not be parsed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for auth session operations
pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a redirect rejection error
    pub fn redirect_rejected(msg: impl Into<String>) -> Self {
        Self::RedirectRejected(msg.into())
    }

    /// Create a stream lost error
    pub fn stream_lost(msg: impl Into<String>) -> Self {
        Self::StreamLost(msg.into())
    }

    /// Whether re-issuing the same command could succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Provider(_))
    }
}
