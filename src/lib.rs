//! # Auth Session Coordinator
//!
//! Client-side authentication session state for applications that sign users
//! in through an external identity provider with a redirect-based OAuth flow.
//! Async/await, strong typing, tokio-based.
//!
//! ## Quick Start
//!
//! ```no_run
//! use auth_session::{AuthConfig, AuthManager, AuthState, OAuthProvider};
//! # use auth_session::provider::SharedAuthProvider;
//! use futures::StreamExt;
//!
//! # async fn example(provider: SharedAuthProvider) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = AuthManager::builder()
//!     .config(AuthConfig::from_env())
//!     .shared_provider(provider)
//!     .build()?;
//!
//! let mut states = Box::pin(manager.observe());
//! manager.sign_in(OAuthProvider::Github).await;
//!
//! while let Some(state) = states.next().await {
//!     match state {
//!         AuthState::Loading => println!("Loading..."),
//!         AuthState::SignedIn { session } => println!("Hello {}", session.user_id()),
//!         AuthState::SignedOut => println!("Signed out"),
//!         AuthState::Error { message } => eprintln!("Auth error: {message}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Fits Together
//!
//! - The provider exposes a stream of [`SessionStatus`] events
//!   ([`provider::AuthProvider::session_status`]).
//! - A [`SessionStateMachine`] maps each event to an [`AuthState`] and
//!   publishes it to every observer, replaying the latest value on subscribe.
//! - [`CommandGateway`] starts sign-in / sign-out. Success never sets state;
//!   failures are published as [`AuthState::Error`].
//! - [`DeepLinkCorrelator`] forwards redirect URIs on the configured callback
//!   scheme and host back to the provider.
//!
//! [`AuthManager`] wires all four together.
//!
//! ## Architecture
//!
//! - [`types`]: Identifiers, sessions, provider status and auth state
//! - [`config`]: Provider endpoint, callback target, environment loading
//! - [`provider`]: Provider trait, push-style adapter, configuration guard
//! - [`machine`]: Status-to-state mapping and broadcast
//! - [`gateway`]: Sign-in / sign-out commands
//! - [`deeplink`]: Redirect URI matching and forwarding
//! - [`manager`]: Composition root
//! - [`error`]: Error types and handling
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tracing events are always emitted but are zero-cost when no subscriber is attached.
//! Access tokens are never logged.
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Demo
//!
//! `demos/session-demo` runs the whole flow against an in-process provider:
//!
//! ```bash
//! cargo run -p session-demo
//! ```
//!
//! ## Error Handling
//!
//! Fallible setup returns [`Result<T, AuthError>`](Result). Commands never
//! return an error; they report a [`CommandOutcome`] and publish failures as
//! state so observers see them too.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod deeplink;
pub mod error;
pub mod gateway;
pub mod machine;
pub mod manager;
pub mod provider;
pub mod types;

// Re-export commonly used types
pub use config::{AuthConfig, AuthConfigBuilder, CallbackTarget, FlowType};
pub use deeplink::{CallbackParams, DeepLinkCorrelator, DeepLinkOutcome};
pub use error::{AuthError, Result};
pub use futures::StreamExt;
pub use gateway::{CommandGateway, CommandOutcome};
pub use machine::{SessionStateMachine, StatePublisher, SubscriptionEnd};
pub use manager::{AuthManager, AuthManagerBuilder};
pub use provider::{
    AuthProvider, ConfiguredProvider, SessionStatusStream, SharedAuthProvider, StatusSender,
    status_channel,
};
pub use types::{
    AuthState, OAuthProvider, RefreshFailureCause, SessionHandle, SessionStatus, UserId,
    UserSession,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
