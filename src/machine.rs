//! Session state machine
//!
//! Owns the current [`AuthState`], consumes the provider's status stream on a
//! background task and republishes every transition to observers.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────┐    SessionStatus    ┌──────────────────────────┐
//! │ provider status stream│ ──────────────────→ │ consumer task            │
//! └───────────────────────┘                     │ select!(cancel, next)    │
//!                                               └────────────┬─────────────┘
//!                                                            │ apply
//!   StatePublisher ── publish_error ──┐                      ▼
//!   (command gateway)                 └─────→ ┌──────────────────────────┐
//!                                             │ Mutex { current, tx }    │
//!                                             └────────────┬─────────────┘
//!                                          broadcast       │      snapshot
//!                                     ┌────────────────────┼────────────┐
//!                                     ▼                    ▼            ▼
//!                                 observe()            observe()    current()
//! ```
//!
//! Setting the current value and broadcasting it happen under one lock, and
//! so do taking a snapshot and subscribing. A state equal to the current one
//! is not broadcast again. A new observer therefore sees the
//! latest state first and then every later transition, with nothing lost or
//! duplicated in between.

use futures::{Stream, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::error::AuthError;
use crate::provider::SessionStatusStream;
use crate::types::{AuthState, SessionHandle, SessionStatus, UserId};

/// Why the status subscription stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEnd {
    /// [`SessionStateMachine::shutdown`] was called or the machine was dropped
    Cancelled,
    /// The upstream stream finished without error
    StreamEnded,
    /// The upstream stream yielded an error
    StreamFailed(String),
}

impl SubscriptionEnd {
    /// Whether the upstream was lost (as opposed to a local shutdown)
    #[must_use]
    pub fn is_stream_lost(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Convert a lost stream into [`AuthError::StreamLost`]
    #[must_use]
    pub fn into_error(self) -> Option<AuthError> {
        match self {
            Self::Cancelled => None,
            Self::StreamEnded => Some(AuthError::stream_lost("status stream ended")),
            Self::StreamFailed(msg) => Some(AuthError::stream_lost(msg)),
        }
    }
}

struct Inner {
    current: AuthState,
    tx: broadcast::Sender<AuthState>,
}

struct Shared {
    inner: Mutex<Inner>,
    cancel: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set and broadcast `next` unless it equals the current state
    ///
    /// Returns `false` once the machine is closed. The closed check happens
    /// under the same lock as [`Self::close`].
    fn publish(&self, next: AuthState, source: &'static str) -> bool {
        let mut inner = self.lock();
        if self.cancel.is_cancelled() {
            return false;
        }
        if inner.current == next {
            tracing::trace!(state = next.name(), source, "Auth state unchanged");
            return true;
        }
        tracing::debug!(state = next.name(), source, "Auth state transition");
        inner.current = next.clone();
        // Err only means nobody is observing right now
        let _ = inner.tx.send(next);
        true
    }

    /// Stop accepting publishes; nothing is published after this returns
    fn close(&self) {
        let _inner = self.lock();
        self.cancel.cancel();
    }

    fn snapshot_and_subscribe(&self) -> (AuthState, broadcast::Receiver<AuthState>) {
        let inner = self.lock();
        (inner.current.clone(), inner.tx.subscribe())
    }
}

/// Side channel for publishing command failures into the state machine
///
/// This is the only way to set a state that did not come from the status
/// stream. Writes interleave with stream-sourced updates last-write-wins.
#[derive(Clone)]
pub struct StatePublisher {
    shared: Arc<Shared>,
}

impl StatePublisher {
    /// Publish [`AuthState::Error`]
    ///
    /// Returns `false` and drops the message when the machine has already
    /// been shut down.
    pub fn publish_error(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let published = self
            .shared
            .publish(AuthState::Error { message: message.clone() }, "command");
        if !published {
            tracing::debug!(%message, "State machine shut down; dropping late command failure");
        }
        published
    }
}

impl std::fmt::Debug for StatePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatePublisher")
            .field("cancelled", &self.shared.cancel.is_cancelled())
            .finish()
    }
}

/// Coordinator between the provider's status stream and state observers
pub struct SessionStateMachine {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    end_rx: watch::Receiver<Option<SubscriptionEnd>>,
}

impl SessionStateMachine {
    /// Start consuming `statuses` on a background task
    ///
    /// The initial state is [`AuthState::Loading`]. `channel_capacity` bounds
    /// how many transitions an observer may fall behind before it skips ahead.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(statuses: SessionStatusStream, channel_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                current: AuthState::Loading,
                tx,
            }),
            cancel: cancel.clone(),
        });
        let (end_tx, end_rx) = watch::channel(None);

        let task_shared = shared.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let end = Self::consume(statuses, task_shared, task_cancel).await;
            end_tx.send_replace(Some(end));
        });

        Self {
            shared,
            cancel,
            end_rx,
        }
    }

    /// Status consumer loop - applies events strictly in arrival order
    async fn consume(
        mut statuses: SessionStatusStream,
        shared: Arc<Shared>,
        cancel: CancellationToken,
    ) -> SubscriptionEnd {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!("Status subscription cancelled");
                    return SubscriptionEnd::Cancelled;
                }
                next = statuses.next() => {
                    match next {
                        Some(Ok(status)) => Self::apply(&shared, status),
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "Session status stream failed; last state retained");
                            return SubscriptionEnd::StreamFailed(e.to_string());
                        }
                        None => {
                            tracing::error!("Session status stream ended; last state retained");
                            return SubscriptionEnd::StreamEnded;
                        }
                    }
                }
            }
        }
    }

    fn apply(shared: &Shared, status: SessionStatus) {
        tracing::trace!(status = ?status, "Received session status");
        shared.publish(AuthState::from(status), "stream");
    }

    /// Latest published state
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.shared.lock().current.clone()
    }

    /// Session handle of the current state, if signed in
    #[must_use]
    pub fn current_session(&self) -> Option<SessionHandle> {
        self.current().session().cloned()
    }

    /// User ID of the current session, if signed in
    #[must_use]
    pub fn current_user_id(&self) -> Option<UserId> {
        self.current().user_id().cloned()
    }

    /// Subscribe to state changes
    ///
    /// The stream yields the current state immediately, then every later
    /// transition in publish order. It ends when the machine shuts down.
    pub fn observe(&self) -> impl Stream<Item = AuthState> + Send + use<> {
        let (snapshot, mut rx) = self.shared.snapshot_and_subscribe();
        let cancel = self.cancel.clone();

        async_stream::stream! {
            yield snapshot;
            loop {
                let received = tokio::select! {
                    biased;
                    received = rx.recv() => received,
                    () = cancel.cancelled() => { break; }
                };
                match received {
                    Ok(state) => yield state,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth state observer lagged; skipping to retained states");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Handle for pushing command failures (see [`StatePublisher`])
    #[must_use]
    pub fn publisher(&self) -> StatePublisher {
        StatePublisher {
            shared: self.shared.clone(),
        }
    }

    /// Whether the status subscription is still attached
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.end_rx.borrow().is_none()
    }

    /// Wait until the status subscription stops and report why
    ///
    /// Stream loss is never turned into an [`AuthState::Error`]; the owner
    /// decides whether to restart with a fresh stream.
    pub async fn subscription_end(&self) -> SubscriptionEnd {
        let mut rx = self.end_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(end) => end.as_ref().cloned().unwrap_or(SubscriptionEnd::Cancelled),
            Err(_) => SubscriptionEnd::StreamFailed("status subscription task aborted".to_string()),
        }
    }

    /// Cancel the status subscription
    ///
    /// The last published state stays readable; later command failures are
    /// dropped.
    pub fn shutdown(&self) {
        self.shared.close();
    }

    /// Whether [`Self::shutdown`] has been called
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SessionStateMachine {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl std::fmt::Debug for SessionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStateMachine")
            .field("current", &self.current())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::status_channel;
    use crate::types::{RefreshFailureCause, UserSession};
    use std::time::Duration;

    async fn collect(stream: impl Stream<Item = AuthState>, n: usize) -> Vec<AuthState> {
        tokio::time::timeout(Duration::from_secs(2), stream.take(n).collect::<Vec<_>>())
            .await
            .expect("observer stalled")
    }

    #[tokio::test]
    async fn test_initial_state_is_loading() {
        let (_tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);
        assert_eq!(machine.current(), AuthState::Loading);
        assert!(machine.is_running());
    }

    #[tokio::test]
    async fn test_events_map_in_order() {
        let (tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);
        let observer = machine.observe();

        let session = SessionHandle::new(UserSession::new("u-1", "tok"));
        tx.emit(SessionStatus::Initializing);
        tx.emit(SessionStatus::Authenticated(session.clone()));
        tx.emit(SessionStatus::RefreshFailure(RefreshFailureCause::Network(
            "offline".to_string(),
        )));
        tx.emit(SessionStatus::NotAuthenticated);

        let states = collect(observer, 4).await;
        assert_eq!(
            states,
            vec![
                AuthState::Loading,
                AuthState::SignedIn { session },
                AuthState::error("offline"),
                AuthState::SignedOut,
            ]
        );
    }

    #[tokio::test]
    async fn test_repeated_status_is_not_rebroadcast() {
        let (tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);
        let mut observer = Box::pin(machine.observe());

        tx.emit(SessionStatus::NotAuthenticated);
        tx.emit(SessionStatus::NotAuthenticated);
        tx.emit(SessionStatus::Initializing);

        assert_eq!(
            collect(observer.as_mut(), 3).await,
            vec![AuthState::Loading, AuthState::SignedOut, AuthState::Loading]
        );
        let extra = tokio::time::timeout(Duration::from_millis(50), observer.next()).await;
        assert!(extra.is_err(), "unexpected extra state: {extra:?}");
    }

    #[tokio::test]
    async fn test_reissued_session_is_published() {
        let (tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);
        let observer = machine.observe();

        let first = SessionHandle::new(UserSession::new("u-1", "tok-1"));
        let refreshed = SessionHandle::new(UserSession::new("u-1", "tok-2"));
        tx.emit(SessionStatus::Authenticated(first.clone()));
        tx.emit(SessionStatus::Authenticated(first.clone()));
        tx.emit(SessionStatus::Authenticated(refreshed.clone()));

        assert_eq!(
            collect(observer, 3).await,
            vec![
                AuthState::Loading,
                AuthState::SignedIn { session: first },
                AuthState::SignedIn { session: refreshed },
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_end_keeps_last_state() {
        let (tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);

        tx.emit(SessionStatus::NotAuthenticated);
        drop(tx);

        assert_eq!(machine.subscription_end().await, SubscriptionEnd::StreamEnded);
        assert_eq!(machine.current(), AuthState::SignedOut);
        assert!(!machine.is_running());
    }

    #[tokio::test]
    async fn test_stream_failure_is_reported_not_published() {
        let (tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);

        let session = SessionHandle::new(UserSession::new("u-1", "tok"));
        tx.emit(SessionStatus::Authenticated(session.clone()));
        tx.fail(AuthError::network("websocket closed"));

        let end = machine.subscription_end().await;
        assert!(end.is_stream_lost());
        assert!(matches!(end, SubscriptionEnd::StreamFailed(ref m) if m.contains("websocket closed")));
        assert_eq!(machine.current(), AuthState::SignedIn { session });
        assert!(matches!(end.into_error(), Some(AuthError::StreamLost(_))));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_subscription() {
        let (tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);

        machine.shutdown();
        assert_eq!(machine.subscription_end().await, SubscriptionEnd::Cancelled);
        assert!(machine.is_shut_down());

        // Events after cancellation are never applied
        tx.emit(SessionStatus::NotAuthenticated);
        tokio::task::yield_now().await;
        assert_eq!(machine.current(), AuthState::Loading);
    }

    #[tokio::test]
    async fn test_publisher_side_channel() {
        let (_tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);
        let publisher = machine.publisher();

        assert!(publisher.publish_error("sign-out failed: offline"));
        assert_eq!(machine.current(), AuthState::error("sign-out failed: offline"));

        machine.shutdown();
        assert!(!publisher.publish_error("late"));
        assert_eq!(machine.current(), AuthState::error("sign-out failed: offline"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_publish_after_shutdown_returns() {
        let (_tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let publisher = machine.publisher();
                tokio::spawn(async move {
                    let mut n = 0u32;
                    while publisher.publish_error(format!("writer {w} failure {n}")) {
                        n += 1;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(5)).await;
        machine.shutdown();
        let frozen = machine.current();

        for writer in writers {
            writer.await.unwrap();
        }
        assert_eq!(machine.current(), frozen);
    }

    #[tokio::test]
    async fn test_observe_ends_on_shutdown() {
        let (_tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);
        let observer = machine.observe();
        machine.shutdown();

        let states = collect(observer, 10).await;
        assert_eq!(states, vec![AuthState::Loading]);
    }

    #[tokio::test]
    async fn test_lagging_observer_skips_ahead() {
        let (tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 1);
        let observer = machine.observe();

        tx.emit(SessionStatus::NotAuthenticated);
        tx.emit(SessionStatus::Authenticated(SessionHandle::new(
            UserSession::new("u-1", "tok"),
        )));
        tx.emit(SessionStatus::RefreshFailure("revoked".into()));
        drop(tx);
        machine.subscription_end().await;

        // Capacity 1: only the newest transition is retained
        let states = collect(observer, 2).await;
        assert_eq!(states, vec![AuthState::Loading, AuthState::error("revoked")]);
    }

    #[tokio::test]
    async fn test_current_user_id() {
        let (tx, stream) = status_channel();
        let machine = SessionStateMachine::spawn(stream, 8);
        let mut observer = Box::pin(machine.observe());
        observer.next().await;

        assert!(machine.current_user_id().is_none());
        tx.emit(SessionStatus::Authenticated(SessionHandle::new(
            UserSession::new("u-42", "tok"),
        )));
        observer.next().await;

        assert_eq!(machine.current_user_id(), Some(UserId::from("u-42")));
        assert!(machine.current_session().is_some());
    }
}
