//! In-process provider standing in for a hosted identity backend

use async_trait::async_trait;
use auth_session::{
    AuthConfig, AuthError, AuthProvider, CallbackParams, OAuthProvider, Result, SessionHandle,
    SessionStatus, SessionStatusStream, StatusSender, UserSession, status_channel,
};
use std::collections::HashSet;
use std::sync::Mutex;
use url::Url;

pub struct DemoProvider {
    config: AuthConfig,
    events: StatusSender,
    stream: Mutex<Option<SessionStatusStream>>,
    pending: Mutex<Option<OAuthProvider>>,
    consumed: Mutex<HashSet<String>>,
}

impl DemoProvider {
    pub fn new(config: AuthConfig) -> Self {
        let (events, stream) = status_channel();
        // No persisted session to restore
        events.emit(SessionStatus::Initializing);
        events.emit(SessionStatus::NotAuthenticated);
        Self {
            config,
            events,
            stream: Mutex::new(Some(stream)),
            pending: Mutex::new(None),
            consumed: Mutex::new(HashSet::new()),
        }
    }

    /// Authorize URL the browser would be sent to
    fn authorize_url(&self, provider: &OAuthProvider) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint_url)?.join("auth/v1/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", &self.config.callback.redirect_uri())
            .append_pair("flow_type", self.config.flow_type.as_str());
        Ok(url)
    }
}

#[async_trait]
impl AuthProvider for DemoProvider {
    fn session_status(&self) -> SessionStatusStream {
        self.stream
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .unwrap_or_else(|| Box::pin(futures::stream::empty::<Result<SessionStatus>>()))
    }

    async fn sign_in_with(&self, provider: &OAuthProvider) -> Result<()> {
        if let OAuthProvider::Custom(slug) = provider {
            return Err(AuthError::provider(format!("provider {slug:?} is not enabled")));
        }
        let url = self.authorize_url(provider)?;
        println!("  open in a browser: {url}");
        println!(
            "  then paste e.g. {}?code=demo123",
            self.config.callback.redirect_uri()
        );
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(provider.clone());
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        self.events.emit(SessionStatus::NotAuthenticated);
        Ok(())
    }

    async fn complete_redirect(&self, callback: &Url) -> Result<()> {
        let params = CallbackParams::from_url(callback);
        if let Some(error) = params.error {
            let detail = params.error_description.unwrap_or(error);
            return Err(AuthError::redirect_rejected(detail));
        }
        let code = params
            .code
            .ok_or_else(|| AuthError::redirect_rejected("missing authorization code"))?;

        let fresh = self
            .consumed
            .lock()
            .map(|mut consumed| consumed.insert(code.clone()))
            .unwrap_or(false);
        if !fresh {
            return Err(AuthError::redirect_rejected("authorization code already used"));
        }

        let provider = self
            .pending
            .lock()
            .ok()
            .and_then(|mut p| p.take())
            .unwrap_or(OAuthProvider::Github);
        let session = UserSession::new(format!("demo-{code}"), format!("access-{code}"))
            .with_email(format!("{code}@example.com"))
            .with_provider(provider)
            .expires_in(3600);
        self.events
            .emit(SessionStatus::Authenticated(SessionHandle::new(session)));
        Ok(())
    }
}
