//! In-process identity backend used by the integration tests
//!
//! Behaves like a hosted provider: sessions only appear after a redirect
//! carrying a fresh authorization code. Sign-out emits a status only when a
//! session existed, unless `echo_sign_out` is set.

#![allow(dead_code)]

use async_trait::async_trait;
use auth_session::{
    AuthConfig, AuthError, AuthProvider, AuthState, CallbackParams, CallbackTarget,
    OAuthProvider, Result, SessionHandle, SessionStatus, SessionStatusStream, StatusSender,
    UserSession, status_channel,
};
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const APP_SCHEME: &str = "io.example.app";

/// Route crate logs to the test harness; `RUST_LOG=auth_session=trace` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn complete_config() -> AuthConfig {
    AuthConfig::builder()
        .endpoint_url("https://project.supabase.co")
        .api_key("public-anon-key")
        .callback(CallbackTarget::new(APP_SCHEME))
        .build()
}

pub fn callback_uri(code: &str) -> String {
    format!("{APP_SCHEME}://auth-callback?code={code}&state=s-1")
}

#[derive(Default)]
pub struct FakeBackend {
    events: Mutex<Option<StatusSender>>,
    stream: Mutex<Option<SessionStatusStream>>,
    session: Mutex<Option<SessionHandle>>,
    consumed: Mutex<HashSet<String>>,
    fail_commands: AtomicBool,
    echo_sign_out: AtomicBool,
    pub sign_in_calls: AtomicU32,
    pub sign_out_calls: AtomicU32,
    pub redirects: AtomicU32,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        let (events, stream) = status_channel();
        Arc::new(Self {
            events: Mutex::new(Some(events)),
            stream: Mutex::new(Some(stream)),
            ..Self::default()
        })
    }

    pub fn emit(&self, status: SessionStatus) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            events.emit(status);
        }
    }

    pub fn fail_stream(&self, error: AuthError) {
        if let Some(events) = self.events.lock().unwrap().take() {
            events.fail(error);
        }
    }

    pub fn close_stream(&self) {
        self.events.lock().unwrap().take();
    }

    pub fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    /// Emit `NotAuthenticated` on every sign-out, session or not
    pub fn echo_sign_out(&self, echo: bool) {
        self.echo_sign_out.store(echo, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthProvider for FakeBackend {
    fn session_status(&self) -> SessionStatusStream {
        self.stream
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Box::pin(futures::stream::empty::<Result<SessionStatus>>()))
    }

    async fn sign_in_with(&self, _provider: &OAuthProvider) -> Result<()> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(AuthError::network("connection refused"));
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(AuthError::network("connection refused"));
        }
        let had_session = self.session.lock().unwrap().take().is_some();
        if had_session || self.echo_sign_out.load(Ordering::SeqCst) {
            self.emit(SessionStatus::NotAuthenticated);
        }
        Ok(())
    }

    async fn complete_redirect(&self, callback: &Url) -> Result<()> {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        let Some(code) = CallbackParams::from_url(callback).code else {
            return Err(AuthError::redirect_rejected("missing authorization code"));
        };
        if !self.consumed.lock().unwrap().insert(code.clone()) {
            return Err(AuthError::redirect_rejected("authorization code already used"));
        }

        let session = SessionHandle::new(
            UserSession::new(format!("user-{code}"), format!("token-{code}"))
                .with_provider(OAuthProvider::Github)
                .expires_in(3600),
        );
        *self.session.lock().unwrap() = Some(session.clone());
        self.emit(SessionStatus::Authenticated(session));
        Ok(())
    }
}

/// Next observed state, failing the test if none arrives in time
pub async fn next_state<S>(observer: &mut S) -> AuthState
where
    S: Stream<Item = AuthState> + Unpin,
{
    tokio::time::timeout(Duration::from_secs(2), observer.next())
        .await
        .expect("no state within 2s")
        .expect("observer ended")
}

/// Assert that nothing else is published for a short while
pub async fn assert_quiet<S>(observer: &mut S)
where
    S: Stream<Item = AuthState> + Unpin,
{
    let extra = tokio::time::timeout(Duration::from_millis(100), observer.next()).await;
    assert!(extra.is_err(), "unexpected extra state: {extra:?}");
}
