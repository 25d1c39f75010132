//! Deep link correlation for OAuth redirects
//!
//! The provider redirects the browser back to `<app-scheme>://auth-callback?...`
//! and the OS hands that URI to the application. Only URIs on the configured
//! callback scheme and host are forwarded to the provider's completion
//! routine; everything else is ignored without touching state.

use url::Url;

use crate::config::CallbackTarget;
use crate::provider::SharedAuthProvider;

/// What [`DeepLinkCorrelator::handle`] did with a URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLinkOutcome {
    /// Not an auth callback (or not a URI at all)
    Ignored,
    /// Forwarded and accepted by the provider
    Forwarded,
    /// Forwarded, but the provider refused it (consumed code, bad state, ...)
    Rejected {
        /// Provider diagnostic
        reason: String,
    },
}

/// OAuth parameters carried by a callback URI
///
/// Read from the query and, for implicit-flow redirects, the fragment.
/// Used for logging only; forwarding never depends on them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    /// Authorization code (PKCE flow)
    pub code: Option<String>,
    /// Opaque state echoed by the provider
    pub state: Option<String>,
    /// OAuth error code
    pub error: Option<String>,
    /// Human-readable OAuth error
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Extract callback parameters from `url`
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        let fragment_pairs = url
            .fragment()
            .map(|f| url::form_urlencoded::parse(f.as_bytes()).collect::<Vec<_>>())
            .unwrap_or_default();

        for (key, value) in url.query_pairs().chain(fragment_pairs) {
            let slot = match &*key {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    /// Whether the provider redirected with an OAuth error
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Routes matching redirect URIs to the provider
#[derive(Clone)]
pub struct DeepLinkCorrelator {
    target: CallbackTarget,
    provider: SharedAuthProvider,
}

impl DeepLinkCorrelator {
    /// Create a correlator for `target`
    #[must_use]
    pub fn new(target: CallbackTarget, provider: SharedAuthProvider) -> Self {
        Self { target, provider }
    }

    /// Callback this correlator accepts
    #[must_use]
    pub fn target(&self) -> &CallbackTarget {
        &self.target
    }

    /// Parse `uri` and return it if scheme and host match the callback
    ///
    /// Both comparisons ignore ASCII case.
    #[must_use]
    pub fn matches(&self, uri: &str) -> Option<Url> {
        let url = Url::parse(uri.trim()).ok()?;
        let scheme_ok =
            !self.target.scheme.is_empty() && url.scheme().eq_ignore_ascii_case(&self.target.scheme);
        let host_ok = url
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.target.host));
        (scheme_ok && host_ok).then_some(url)
    }

    /// Forward a matching callback URI to the provider
    ///
    /// Non-matching input is ignored. A provider rejection is logged and
    /// returned but never published as state: the provider reports redirect
    /// failures through its own status stream. Replaying a consumed callback
    /// is safe because the provider rejects it.
    pub async fn handle(&self, uri: &str) -> DeepLinkOutcome {
        let Some(url) = self.matches(uri) else {
            tracing::trace!("Ignoring non-callback deep link");
            return DeepLinkOutcome::Ignored;
        };

        let params = CallbackParams::from_url(&url);
        tracing::debug!(
            has_code = params.code.is_some(),
            has_state = params.state.is_some(),
            error = params.error.as_deref().unwrap_or(""),
            "Forwarding auth callback"
        );
        if params.is_error() {
            tracing::warn!(
                error = params.error.as_deref().unwrap_or_default(),
                description = params.error_description.as_deref().unwrap_or_default(),
                "Provider redirected with an OAuth error"
            );
        }

        match self.provider.complete_redirect(&url).await {
            Ok(()) => DeepLinkOutcome::Forwarded,
            Err(e) => {
                tracing::warn!(error = %e, "Provider rejected auth callback");
                DeepLinkOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for DeepLinkCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepLinkCorrelator")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
