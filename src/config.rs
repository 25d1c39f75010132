//! Startup configuration
//!
//! The endpoint URL and public API key come from an external mechanism
//! (build-time properties, environment, a JSON file). Missing values never
//! fail construction: they are reported by [`AuthConfig::validate`] and make
//! every provider call fail through [`crate::provider::ConfiguredProvider`].

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::error::{AuthError, Result};

/// Default host of the redirect callback deep link
pub const DEFAULT_CALLBACK_HOST: &str = "auth-callback";

/// Default capacity of the per-observer state channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Environment variable holding the provider endpoint URL
pub const ENV_PROVIDER_URL: &str = "AUTH_PROVIDER_URL";
/// Environment variable holding the public API key
pub const ENV_PROVIDER_API_KEY: &str = "AUTH_PROVIDER_API_KEY";
/// Environment variable overriding the callback scheme
pub const ENV_CALLBACK_SCHEME: &str = "AUTH_CALLBACK_SCHEME";
/// Environment variable overriding the callback host
pub const ENV_CALLBACK_HOST: &str = "AUTH_CALLBACK_HOST";

/// OAuth flow used for redirect-based sign-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    /// Authorization code with PKCE; code arrives in the callback query
    #[default]
    Pkce,
    /// Implicit flow; tokens arrive in the callback fragment
    Implicit,
}

impl FlowType {
    /// Wire name, as sent in the authorize request
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pkce => "pkce",
            Self::Implicit => "implicit",
        }
    }
}

/// Scheme and host of the deep link the provider redirects back to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallbackTarget {
    /// Application URI scheme, e.g. `io.example.app`
    pub scheme: String,
    /// Callback host
    #[serde(default = "default_callback_host")]
    pub host: String,
}

fn default_callback_host() -> String {
    DEFAULT_CALLBACK_HOST.to_string()
}

impl CallbackTarget {
    /// Callback on the default `auth-callback` host
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: default_callback_host(),
        }
    }

    /// Override the host
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Redirect URI registered with the provider, e.g. `io.example.app://auth-callback`
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

impl Default for CallbackTarget {
    fn default() -> Self {
        Self::new("")
    }
}

/// Configuration for an [`crate::AuthManager`]
#[derive(Debug, Clone, Default, Deserialize, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for AuthConfig"),
    builder_type(doc = "Builder for AuthConfig", vis = "pub"),
    build_method(doc = "Build the AuthConfig")
)]
pub struct AuthConfig {
    /// Identity provider endpoint URL
    #[builder(default, setter(into))]
    #[serde(default)]
    pub endpoint_url: String,

    /// Public (anon) API key
    #[builder(default, setter(into))]
    #[serde(default)]
    pub api_key: String,

    /// Deep link the provider redirects back to
    #[builder(default)]
    #[serde(default)]
    pub callback: CallbackTarget,

    /// OAuth flow variant
    #[builder(default)]
    #[serde(default)]
    pub flow_type: FlowType,

    /// Buffered states per observer before it is resynchronised
    #[builder(default = DEFAULT_CHANNEL_CAPACITY)]
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl AuthConfig {
    /// Read configuration from the environment
    ///
    /// Unset variables become empty strings or defaults; nothing here fails.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        let mut callback = CallbackTarget::new(var(ENV_CALLBACK_SCHEME));
        if let Ok(host) = std::env::var(ENV_CALLBACK_HOST) {
            if !host.is_empty() {
                callback.host = host;
            }
        }

        Self {
            endpoint_url: var(ENV_PROVIDER_URL),
            api_key: var(ENV_PROVIDER_API_KEY),
            callback,
            flow_type: FlowType::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Parse configuration from a JSON document
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Json`] if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Report the first problem that would make provider calls fail
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingConfig`] for absent values and
    /// [`AuthError::InvalidConfig`] for an endpoint that is not a URL.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_url.trim().is_empty() {
            return Err(AuthError::MissingConfig("endpoint_url"));
        }
        if self.api_key.trim().is_empty() {
            return Err(AuthError::MissingConfig("api_key"));
        }
        if self.callback.scheme.trim().is_empty() {
            return Err(AuthError::MissingConfig("callback.scheme"));
        }
        url::Url::parse(&self.endpoint_url).map_err(|e| {
            AuthError::invalid_config(format!("endpoint_url {:?}: {e}", self.endpoint_url))
        })?;
        Ok(())
    }

    /// Whether [`Self::validate`] passes
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }
}
