//! `AuthManager` - composition root
//!
//! Wires one provider to a [`SessionStateMachine`], a [`CommandGateway`] and a
//! [`DeepLinkCorrelator`]. Construct it once and pass it (or an `Arc` of it)
//! to whatever needs the auth state; there is no global instance.
//!
//! # Example
//!
//! ```no_run
//! use auth_session::{AuthConfig, AuthManager, AuthState, CallbackTarget, OAuthProvider};
//! # use auth_session::provider::SharedAuthProvider;
//! use futures::StreamExt;
//!
//! # async fn example(provider: SharedAuthProvider) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::builder()
//!     .endpoint_url("https://project.supabase.co")
//!     .api_key("public-anon-key")
//!     .callback(CallbackTarget::new("io.example.app"))
//!     .build();
//!
//! let manager = AuthManager::builder()
//!     .config(config)
//!     .shared_provider(provider)
//!     .build()?;
//!
//! let mut states = Box::pin(manager.observe());
//! manager.sign_in(OAuthProvider::Github).await;
//!
//! // Later, when the OS hands the redirect back:
//! manager.handle_deep_link("io.example.app://auth-callback?code=...").await;
//!
//! while let Some(state) = states.next().await {
//!     if let AuthState::SignedIn { session } = state {
//!         println!("Signed in as {}", session.user_id());
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use futures::Stream;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::deeplink::{DeepLinkCorrelator, DeepLinkOutcome};
use crate::error::{AuthError, Result};
use crate::gateway::{CommandGateway, CommandOutcome};
use crate::machine::{SessionStateMachine, SubscriptionEnd};
use crate::provider::{AuthProvider, ConfiguredProvider, SharedAuthProvider};
use crate::types::{AuthState, OAuthProvider, SessionHandle, UserId};

/// Builder for [`AuthManager`]
#[derive(Default)]
pub struct AuthManagerBuilder {
    config: Option<AuthConfig>,
    provider: Option<SharedAuthProvider>,
}

impl AuthManagerBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration (default: [`AuthConfig::from_env`])
    #[must_use]
    pub fn config(mut self, config: AuthConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the identity provider
    #[must_use]
    pub fn provider<P: AuthProvider + 'static>(mut self, provider: P) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Set an already shared identity provider
    #[must_use]
    pub fn shared_provider(mut self, provider: SharedAuthProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Build the manager and start the status subscription
    ///
    /// Incomplete configuration is not an error here; it makes every
    /// provider call fail later, surfaced as [`AuthState::Error`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if no provider was set.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<AuthManager> {
        let provider = self
            .provider
            .ok_or_else(|| AuthError::invalid_config("no auth provider set"))?;
        let config = self.config.unwrap_or_else(AuthConfig::from_env);
        Ok(AuthManager::assemble(config, provider))
    }
}

/// Session-state coordinator: state, commands and deep links in one handle
pub struct AuthManager {
    config: AuthConfig,
    machine: SessionStateMachine,
    gateway: CommandGateway,
    correlator: DeepLinkCorrelator,
}

impl AuthManager {
    /// Create a builder
    #[must_use]
    pub fn builder() -> AuthManagerBuilder {
        AuthManagerBuilder::new()
    }

    /// Create a manager for `provider` with `config`
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new<P: AuthProvider + 'static>(config: AuthConfig, provider: P) -> Self {
        Self::assemble(config, Arc::new(provider))
    }

    fn assemble(config: AuthConfig, provider: SharedAuthProvider) -> Self {
        let provider: SharedAuthProvider =
            Arc::new(ConfiguredProvider::new(provider, config.clone()));
        let machine = SessionStateMachine::spawn(provider.session_status(), config.channel_capacity);
        let gateway = CommandGateway::new(provider.clone(), machine.publisher());
        let correlator = DeepLinkCorrelator::new(config.callback.clone(), provider);

        tracing::debug!(
            callback = %config.callback.redirect_uri(),
            configured = config.is_complete(),
            "Auth manager started"
        );

        Self {
            config,
            machine,
            gateway,
            correlator,
        }
    }

    /// Configuration in effect
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Latest published state
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.machine.current()
    }

    /// Subscribe to state changes, starting with the current state
    pub fn observe(&self) -> impl Stream<Item = AuthState> + Send + use<> {
        self.machine.observe()
    }

    /// Session handle, if signed in
    #[must_use]
    pub fn current_session(&self) -> Option<SessionHandle> {
        self.machine.current_session()
    }

    /// User ID, if signed in
    #[must_use]
    pub fn current_user_id(&self) -> Option<UserId> {
        self.machine.current_user_id()
    }

    /// Start a redirect-based sign-in (see [`CommandGateway::sign_in`])
    pub async fn sign_in(&self, provider: OAuthProvider) -> CommandOutcome {
        self.gateway.sign_in(provider).await
    }

    /// Sign out (see [`CommandGateway::sign_out`])
    pub async fn sign_out(&self) -> CommandOutcome {
        self.gateway.sign_out().await
    }

    /// Route an inbound deep link (see [`DeepLinkCorrelator::handle`])
    pub async fn handle_deep_link(&self, uri: &str) -> DeepLinkOutcome {
        self.correlator.handle(uri).await
    }

    /// Gateway handle for callers that only issue commands
    #[must_use]
    pub fn gateway(&self) -> CommandGateway {
        self.gateway.clone()
    }

    /// Correlator handle for the platform's deep-link entry point
    #[must_use]
    pub fn correlator(&self) -> DeepLinkCorrelator {
        self.correlator.clone()
    }

    /// Whether the status subscription is still attached
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    /// Wait for the status subscription to stop (the "stream lost" signal)
    pub async fn subscription_end(&self) -> SubscriptionEnd {
        self.machine.subscription_end().await
    }

    /// Cancel the status subscription; in-flight commands still finish
    pub fn shutdown(&self) {
        self.machine.shutdown();
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("callback", &self.config.callback)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}
