//! Identity provider seam
//!
//! The coordinator never talks to an identity backend directly. Implement
//! [`AuthProvider`] over whatever SDK or HTTP client the application uses and
//! translate its raw callbacks into [`SessionStatus`] events.
//!
//! # Example: Adapting a callback-based SDK
//!
//! ```no_run
//! use auth_session::provider::{AuthProvider, SessionStatusStream, StatusSender, status_channel};
//! use auth_session::types::{OAuthProvider, SessionStatus};
//! use auth_session::Result;
//! use async_trait::async_trait;
//! use std::sync::Mutex;
//! use url::Url;
//!
//! struct MyBackend {
//!     events: StatusSender,
//!     stream: Mutex<Option<SessionStatusStream>>,
//! }
//!
//! impl MyBackend {
//!     fn new() -> Self {
//!         let (events, stream) = status_channel();
//!         // Hand `events` to the SDK's listener and push translated statuses
//!         events.emit(SessionStatus::Initializing);
//!         Self { events, stream: Mutex::new(Some(stream)) }
//!     }
//! }
//!
//! #[async_trait]
//! impl AuthProvider for MyBackend {
//!     fn session_status(&self) -> SessionStatusStream {
//!         self.stream
//!             .lock()
//!             .ok()
//!             .and_then(|mut s| s.take())
//!             .unwrap_or_else(|| Box::pin(futures::stream::empty::<Result<SessionStatus>>()))
//!     }
//!
//!     async fn sign_in_with(&self, provider: &OAuthProvider) -> Result<()> {
//!         println!("open browser for {provider}");
//!         Ok(())
//!     }
//!
//!     async fn sign_out(&self) -> Result<()> {
//!         self.events.emit(SessionStatus::NotAuthenticated);
//!         Ok(())
//!     }
//!
//!     async fn complete_redirect(&self, _callback: &Url) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::types::{OAuthProvider, SessionStatus};

/// Upstream stream of provider status events
///
/// `Some(Err(_))` and `None` both end the subscription; the state machine
/// never polls the stream again afterwards.
pub type SessionStatusStream = Pin<Box<dyn Stream<Item = Result<SessionStatus>> + Send>>;

// ============================================================================
// Provider Trait
// ============================================================================

/// Identity provider operations consumed by the coordinator
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Stream of session status events for the lifetime of the provider
    ///
    /// Called once, when the state machine starts.
    fn session_status(&self) -> SessionStatusStream;

    /// Start a redirect-based sign-in with an external provider
    ///
    /// Success only means the flow was started; the resulting session
    /// arrives later as [`SessionStatus::Authenticated`].
    async fn sign_in_with(&self, provider: &OAuthProvider) -> Result<()>;

    /// End the current session
    async fn sign_out(&self) -> Result<()>;

    /// Finish a redirect flow from the callback URI (code exchange)
    ///
    /// Rejecting an already consumed callback is the provider's job.
    async fn complete_redirect(&self, callback: &Url) -> Result<()>;
}

// Blanket implementation for boxed trait objects
#[async_trait]
impl AuthProvider for Box<dyn AuthProvider> {
    fn session_status(&self) -> SessionStatusStream {
        (**self).session_status()
    }

    async fn sign_in_with(&self, provider: &OAuthProvider) -> Result<()> {
        (**self).sign_in_with(provider).await
    }

    async fn sign_out(&self) -> Result<()> {
        (**self).sign_out().await
    }

    async fn complete_redirect(&self, callback: &Url) -> Result<()> {
        (**self).complete_redirect(callback).await
    }
}

#[async_trait]
impl<T: AuthProvider + ?Sized> AuthProvider for Arc<T> {
    fn session_status(&self) -> SessionStatusStream {
        (**self).session_status()
    }

    async fn sign_in_with(&self, provider: &OAuthProvider) -> Result<()> {
        (**self).sign_in_with(provider).await
    }

    async fn sign_out(&self) -> Result<()> {
        (**self).sign_out().await
    }

    async fn complete_redirect(&self, callback: &Url) -> Result<()> {
        (**self).complete_redirect(callback).await
    }
}

/// Type alias for a shared provider.
pub type SharedAuthProvider = Arc<dyn AuthProvider>;

// ============================================================================
// Push-style status adapter
// ============================================================================

/// Sending half of [`status_channel`]
///
/// Dropping every clone ends the stream.
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: mpsc::UnboundedSender<Result<SessionStatus>>,
}

impl StatusSender {
    /// Push a status event; returns `false` once the stream is gone
    pub fn emit(&self, status: SessionStatus) -> bool {
        self.tx.send(Ok(status)).is_ok()
    }

    /// Fail the stream; it ends right after yielding `error`
    pub fn fail(&self, error: AuthError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// Whether the receiving stream was dropped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a push-style status source for callback-based provider SDKs
#[must_use]
pub fn status_channel() -> (StatusSender, SessionStatusStream) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<SessionStatus>>();
    let stream = async_stream::stream! {
        while let Some(item) = rx.recv().await {
            let failed = item.is_err();
            yield item;
            if failed {
                break;
            }
        }
    };
    (StatusSender { tx }, Box::pin(stream))
}

// ============================================================================
// Configuration guard
// ============================================================================

/// Provider wrapper that fails every call while configuration is incomplete
///
/// The status stream is delegated untouched so the state machine still starts.
pub struct ConfiguredProvider<P> {
    inner: P,
    config: AuthConfig,
}

impl<P: AuthProvider> ConfiguredProvider<P> {
    /// Wrap `inner`, checking `config` on every call
    pub fn new(inner: P, config: AuthConfig) -> Self {
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "Auth provider configured incompletely; calls will fail");
        }
        Self { inner, config }
    }

    /// Configuration being enforced
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Wrapped provider
    #[must_use]
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: AuthProvider> AuthProvider for ConfiguredProvider<P> {
    fn session_status(&self) -> SessionStatusStream {
        self.inner.session_status()
    }

    async fn sign_in_with(&self, provider: &OAuthProvider) -> Result<()> {
        self.config.validate()?;
        self.inner.sign_in_with(provider).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.config.validate()?;
        self.inner.sign_out().await
    }

    async fn complete_redirect(&self, callback: &Url) -> Result<()> {
        self.config.validate()?;
        self.inner.complete_redirect(callback).await
    }
}
