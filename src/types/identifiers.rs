//! Newtype wrappers and selectors

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

// ============================================================================
// Newtype Wrappers for Type Safety
// ============================================================================

/// User ID newtype, as assigned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the user ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for UserId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// OAuth provider selector
// ============================================================================

/// External identity provider used for a redirect-based sign-in
///
/// Known providers are matched case-insensitively by `From<&str>`; any other
/// slug is kept verbatim in [`OAuthProvider::Custom`]. A `Custom` slug that
/// spells a known provider serializes to the same string and therefore reads
/// back as the known variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    /// GitHub
    Github,
    /// Google
    Google,
    /// GitLab
    Gitlab,
    /// Sign in with Apple
    Apple,
    /// Microsoft Entra / Azure AD
    Azure,
    /// Any other provider slug understood by the backend
    #[serde(untagged)]
    Custom(String),
}

impl OAuthProvider {
    /// Provider slug as sent to the identity backend
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Github => "github",
            Self::Google => "google",
            Self::Gitlab => "gitlab",
            Self::Apple => "apple",
            Self::Azure => "azure",
            Self::Custom(slug) => slug,
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for OAuthProvider {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "github" => Self::Github,
            "google" => Self::Google,
            "gitlab" => Self::Gitlab,
            "apple" => Self::Apple,
            "azure" => Self::Azure,
            _ => Self::Custom(s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_conversions() {
        let id = UserId::from("8f14e45f");
        assert_eq!(id.as_str(), "8f14e45f");
        assert_eq!(id.to_string(), "8f14e45f");
        assert_eq!(&*id, "8f14e45f");
    }

    #[test]
    fn test_provider_slug_round_trip() {
        assert_eq!(OAuthProvider::from("GitHub"), OAuthProvider::Github);
        assert_eq!(OAuthProvider::Github.as_str(), "github");
        assert_eq!(
            OAuthProvider::from("keycloak"),
            OAuthProvider::Custom("keycloak".to_string())
        );
    }

    #[test]
    fn test_provider_serializes_as_slug() {
        let json = serde_json::to_string(&OAuthProvider::Gitlab).unwrap();
        assert_eq!(json, "\"gitlab\"");
        let custom = serde_json::to_string(&OAuthProvider::Custom("okta".into())).unwrap();
        assert_eq!(custom, "\"okta\"");
    }

    #[test]
    fn test_custom_slug_keeps_case() {
        let provider = OAuthProvider::from("KeyCloak-Prod");
        assert_eq!(provider, OAuthProvider::Custom("KeyCloak-Prod".to_string()));
        assert_eq!(provider.as_str(), "KeyCloak-Prod");

        let json = serde_json::to_string(&provider).unwrap();
        let back: OAuthProvider = serde_json::from_str(&json).unwrap();
        assert_eq!(back, provider);
    }

    #[test]
    fn test_custom_known_slug_reads_back_as_known() {
        let json = serde_json::to_string(&OAuthProvider::Custom("github".into())).unwrap();
        let back: OAuthProvider = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OAuthProvider::Github);
    }
}
