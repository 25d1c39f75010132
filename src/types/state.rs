//! Provider status input and the application-facing auth state

use serde::Serialize;

use super::identifiers::UserId;
use super::session::SessionHandle;

/// Why the provider failed to refresh a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RefreshFailureCause {
    /// Network was unreachable or timed out
    Network(String),
    /// Provider answered with a server-side failure
    Server(String),
    /// Anything else the provider reports (revoked, expired, ...)
    Other(String),
}

impl RefreshFailureCause {
    /// Human-readable diagnostic carried into [`AuthState::Error`]
    #[must_use]
    pub fn describe(&self) -> &str {
        match self {
            Self::Network(msg) | Self::Server(msg) | Self::Other(msg) => msg,
        }
    }
}

impl std::fmt::Display for RefreshFailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

impl From<&str> for RefreshFailureCause {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for RefreshFailureCause {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

/// Low-level session status as emitted by the identity provider
///
/// This is the only input of the state machine; every published
/// [`AuthState`] derives from exactly one of these events (apart from
/// command failures, see [`crate::gateway`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Provider is loading a persisted session or otherwise starting up
    Initializing,
    /// A valid session exists
    Authenticated(SessionHandle),
    /// No session
    NotAuthenticated,
    /// Background token refresh failed
    RefreshFailure(RefreshFailureCause),
}

/// Application-facing authentication state
///
/// Exactly one value is current at any time. `SignedIn` can only be reached
/// from [`SessionStatus::Authenticated`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
    /// Initial or transitional; no session established yet
    #[default]
    Loading,
    /// A valid session exists
    SignedIn {
        /// Provider-owned session data
        session: SessionHandle,
    },
    /// No session
    SignedOut,
    /// A recoverable failure occurred
    Error {
        /// Human-readable diagnostic
        message: String,
    },
}

impl AuthState {
    /// Create an error state
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether a session is established
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn { .. })
    }

    /// Session handle when signed in
    #[must_use]
    pub fn session(&self) -> Option<&SessionHandle> {
        match self {
            Self::SignedIn { session } => Some(session),
            _ => None,
        }
    }

    /// User ID when signed in
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.session().map(SessionHandle::user_id)
    }

    /// Diagnostic when in the error state
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Stable lowercase label, used as a tracing field
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::SignedIn { .. } => "signed_in",
            Self::SignedOut => "signed_out",
            Self::Error { .. } => "error",
        }
    }
}

impl From<SessionStatus> for AuthState {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Initializing => Self::Loading,
            SessionStatus::Authenticated(session) => Self::SignedIn { session },
            SessionStatus::NotAuthenticated => Self::SignedOut,
            SessionStatus::RefreshFailure(cause) => Self::Error {
                message: cause.describe().to_string(),
            },
        }
    }
}
