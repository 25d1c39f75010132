//! Type definitions for the auth session coordinator
//!
//! Identifiers, provider-owned session data, the provider status input and
//! the application-facing [`AuthState`].

// Module declarations
pub mod identifiers;
pub mod session;
pub mod state;

pub use identifiers::{OAuthProvider, UserId};
pub use session::{SessionHandle, UserSession};
pub use state::{AuthState, RefreshFailureCause, SessionStatus};
