//! Provider-owned session data and the shared handle passed through states

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::identifiers::{OAuthProvider, UserId};

/// Seconds before `expires_at` at which a session already counts as expired
const EXPIRY_SKEW_SECS: u64 = 60;

/// Session data established by the identity provider
#[derive(Clone, Serialize, Deserialize)]
pub struct UserSession {
    /// Provider-assigned user ID
    pub user_id: UserId,

    /// Email address, when the provider shares one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Access token reference; never serialized back out
    #[serde(default, skip_serializing)]
    pub access_token: String,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Unix timestamp when the access token expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,

    /// External provider the user signed in with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<OAuthProvider>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

impl UserSession {
    /// Create a session for `user_id` holding `access_token`
    pub fn new(user_id: impl Into<UserId>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_at: None,
            provider: None,
        }
    }

    /// Set the email address
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set expiry relative to now
    #[must_use]
    pub fn expires_in(mut self, seconds: u64) -> Self {
        self.expires_at = Some(now_secs().saturating_add(seconds));
        self
    }

    /// Set the external provider
    #[must_use]
    pub fn with_provider(mut self, provider: OAuthProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Check if the access token is expired (with 60 second buffer)
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => now_secs().saturating_add(EXPIRY_SKEW_SECS) >= expires_at,
            None => false,
        }
    }

    /// Get the Authorization header value
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Get remaining validity duration, if known
    #[must_use]
    pub fn remaining_validity(&self) -> Option<Duration> {
        let expires_at = self.expires_at?;
        let now = now_secs();
        (expires_at > now).then(|| Duration::from_secs(expires_at - now))
    }
}

impl std::fmt::Debug for UserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("provider", &self.provider)
            .finish()
    }
}

/// Shared, immutable reference to a [`UserSession`]
///
/// Cloning is cheap. Two handles are equal only when they point at the same
/// session allocation, so a session that the provider re-issued with identical
/// contents is still a different handle.
#[derive(Clone)]
pub struct SessionHandle(Arc<UserSession>);

impl SessionHandle {
    /// Wrap a session in a new handle
    #[must_use]
    pub fn new(session: UserSession) -> Self {
        Self(Arc::new(session))
    }

    /// Borrow the session data
    #[must_use]
    pub fn session(&self) -> &UserSession {
        &self.0
    }

    /// Provider-assigned user ID
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.0.user_id
    }
}

impl From<UserSession> for SessionHandle {
    fn from(session: UserSession) -> Self {
        Self::new(session)
    }
}

impl std::ops::Deref for SessionHandle {
    type Target = UserSession;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SessionHandle {}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for SessionHandle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
