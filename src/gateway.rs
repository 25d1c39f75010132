//! Sign-in / sign-out commands
//!
//! Commands only ask the provider to act. A successful call never sets a
//! state: the provider's status stream reports the result. A failed call is
//! published as [`AuthState::Error`](crate::types::AuthState::Error) through
//! the state machine's [`StatePublisher`] because the provider does not
//! promise a status event for it.
//!
//! Overlapping calls are not deduplicated; each is a single attempt.

use crate::error::AuthError;
use crate::machine::StatePublisher;
use crate::provider::SharedAuthProvider;
use crate::types::OAuthProvider;

/// Result of a command as seen by its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The provider accepted the request
    Completed,
    /// The provider call failed; the same message was published as state
    Failed {
        /// Diagnostic as published
        message: String,
        /// Whether re-issuing the command could succeed
        transient: bool,
    },
}

impl CommandOutcome {
    /// Whether the provider accepted the request
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether the failure is worth retrying
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Failed { transient: true, .. })
    }
}

/// Issues provider commands and reports their failures
#[derive(Clone)]
pub struct CommandGateway {
    provider: SharedAuthProvider,
    publisher: StatePublisher,
}

impl CommandGateway {
    /// Create a gateway publishing failures through `publisher`
    #[must_use]
    pub fn new(provider: SharedAuthProvider, publisher: StatePublisher) -> Self {
        Self {
            provider,
            publisher,
        }
    }

    /// Start a redirect-based sign-in with `provider`
    ///
    /// Suspends until the provider call returns. The session itself arrives
    /// later through the status stream once the redirect completes.
    pub async fn sign_in(&self, provider: OAuthProvider) -> CommandOutcome {
        tracing::debug!(provider = %provider, "Signing in");
        match self.provider.sign_in_with(&provider).await {
            Ok(()) => CommandOutcome::Completed,
            Err(e) => self.fail(&e, format!("sign-in with {provider} failed: {e}")),
        }
    }

    /// End the current session
    pub async fn sign_out(&self) -> CommandOutcome {
        tracing::debug!("Signing out");
        match self.provider.sign_out().await {
            Ok(()) => CommandOutcome::Completed,
            Err(e) => self.fail(&e, format!("sign-out failed: {e}")),
        }
    }

    fn fail(&self, error: &AuthError, message: String) -> CommandOutcome {
        let transient = error.is_transient();
        tracing::warn!(%message, transient, "Auth command failed");
        self.publisher.publish_error(message.clone());
        CommandOutcome::Failed { message, transient }
    }
}

impl std::fmt::Debug for CommandGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGateway")
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}
