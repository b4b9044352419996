//! Session Manager — connection lifecycle and keepalive state
//!
//! A `Session` tracks one logical connection: its state machine, its cached
//! `userId`, and an outbound byte channel. The actual transport (axum
//! WebSocket split sink) lives in the server crate and drains the paired
//! receiver; this crate stays transport-agnostic, mirroring the teacher's
//! split between `cratos-canvas::session` (state) and `cratos-canvas::websocket`
//! (transport).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Session lifecycle state. `Open` is the only state in which frames are
/// processed or broadcast deliveries are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted but not yet fully upgraded.
    Connecting,
    /// Live: frames are processed, broadcasts are delivered.
    Open,
    /// Graceful close in progress.
    Closing,
    /// Transport closed cleanly.
    Closed,
    /// Keepalive liveness check failed; transport is being torn down.
    Dead,
}

/// One logical connection. Holds the outbound channel the server's
/// transport loop drains to forward bytes to the real WebSocket sink, and a
/// close signal the transport loop selects on so the keepalive reaper (or an
/// explicit unregister) can actually tear down the socket rather than just
/// updating in-memory state.
pub struct Session {
    id: Uuid,
    user_id: RwLock<Option<String>>,
    state: RwLock<SessionState>,
    alive: AtomicBool,
    sender: mpsc::UnboundedSender<Vec<u8>>,
    created_at: DateTime<Utc>,
    close: CancellationToken,
}

impl Session {
    /// Create a new session in the `Connecting` state, paired with an
    /// outbound channel whose receiver the caller must drain.
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<Vec<u8>>) -> (Arc<Self>, Uuid) {
        let id = Uuid::new_v4();
        let session = Arc::new(Self {
            id,
            user_id: RwLock::new(None),
            state: RwLock::new(SessionState::Connecting),
            alive: AtomicBool::new(true),
            sender,
            created_at: Utc::now(),
            close: CancellationToken::new(),
        });
        (session, id)
    }

    /// This session's identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When this session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Transition to a new lifecycle state.
    pub async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state;
    }

    /// The cached `userId`, if this session has attributed a write yet.
    pub async fn user_id(&self) -> Option<String> {
        self.user_id.read().await.clone()
    }

    /// Cache a `userId` for the remainder of this session's lifetime. Once
    /// set, a `userId` is never replaced.
    pub async fn set_user_id(&self, user_id: String) {
        let mut guard = self.user_id.write().await;
        if guard.is_none() {
            *guard = Some(user_id);
        }
    }

    /// Mark this session as having demonstrated liveness (any inbound
    /// frame, protocol-level pong, or `KEEPALIVE_PONG`).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    /// Attempt to send bytes if the session is `Open`. Returns `false` if
    /// the session is not open or the channel is closed, in which case the
    /// caller should drop the session with no retry.
    pub async fn try_send(&self, bytes: Vec<u8>) -> bool {
        if self.state().await != SessionState::Open {
            return false;
        }
        self.sender.send(bytes).is_ok()
    }

    /// Signal the transport loop driving this session to terminate the
    /// underlying connection. Idempotent.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Resolves once [`Session::close`] has been called. The transport loop
    /// selects on this alongside inbound/outbound traffic so a reaped
    /// session's socket actually closes instead of lingering.
    pub async fn closed(&self) {
        self.close.cancelled().await;
    }
}

/// Registry of live sessions, keyed by session id.
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session, making it visible to broadcast and keepalive.
    pub async fn register(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id(), session);
    }

    /// Remove a session from the registry and signal its transport loop to
    /// terminate the underlying connection.
    pub async fn unregister(&self, id: Uuid) {
        let removed = self.sessions.write().await.remove(&id);
        if let Some(session) = removed {
            session.close();
        }
    }

    /// Fetch a session by id.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Number of registered sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Snapshot of every currently registered session, regardless of state.
    pub async fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Snapshot of sessions currently in the `Open` state.
    pub async fn open_sessions(&self) -> Vec<Arc<Session>> {
        let sessions = self.all().await;
        let mut open = Vec::with_capacity(sessions.len());
        for s in sessions {
            if s.state().await == SessionState::Open {
                open.push(s);
            }
        }
        open
    }

    /// Run one keepalive sweep: sessions that failed the prior liveness
    /// check transition to `Dead`, have their transport closed, and are
    /// unregistered; surviving sessions have `alive` reset to `false` and
    /// are returned so the caller can send them a `KEEPALIVE_PING` frame.
    #[instrument(skip(self))]
    pub async fn sweep_keepalive(&self) -> Vec<Arc<Session>> {
        let open = self.open_sessions().await;
        let mut needs_ping = Vec::new();

        for session in open {
            if session.alive.swap(false, Ordering::SeqCst) {
                needs_ping.push(session);
            } else {
                session.set_state(SessionState::Dead).await;
                self.unregister(session.id()).await;
                debug!(session_id = %session.id(), "session failed keepalive, marked dead, transport closed");
            }
        }

        needs_ping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::UnboundedSender<Vec<u8>>, mpsc::UnboundedReceiver<Vec<u8>>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_session_starts_connecting() {
        let (tx, _rx) = channel();
        let (session, _id) = Session::new(tx);
        assert_eq!(session.state().await, SessionState::Connecting);
    }

    #[tokio::test]
    async fn test_try_send_fails_when_not_open() {
        let (tx, _rx) = channel();
        let (session, _id) = Session::new(tx);
        assert!(!session.try_send(vec![1, 2, 3]).await);
    }

    #[tokio::test]
    async fn test_try_send_succeeds_when_open() {
        let (tx, mut rx) = channel();
        let (session, _id) = Session::new(tx);
        session.set_state(SessionState::Open).await;
        assert!(session.try_send(vec![1, 2, 3]).await);
        assert_eq!(rx.recv().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_user_id_set_once() {
        let (tx, _rx) = channel();
        let (session, _id) = Session::new(tx);
        session.set_user_id("u1".into()).await;
        session.set_user_id("u2".into()).await;
        assert_eq!(session.user_id().await, Some("u1".to_string()));
    }

    #[tokio::test]
    async fn test_manager_register_and_unregister() {
        let manager = SessionManager::new();
        let (tx, _rx) = channel();
        let (session, id) = Session::new(tx);
        manager.register(session).await;
        assert_eq!(manager.count().await, 1);
        manager.unregister(id).await;
        assert_eq!(manager.count().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_keepalive_pings_alive_sessions() {
        let manager = SessionManager::new();
        let (tx, _rx) = channel();
        let (session, _id) = Session::new(tx);
        session.set_state(SessionState::Open).await;
        manager.register(session).await;

        let needs_ping = manager.sweep_keepalive().await;
        assert_eq!(needs_ping.len(), 1);
        assert_eq!(manager.count().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_keepalive_kills_unresponsive_session() {
        let manager = SessionManager::new();
        let (tx, _rx) = channel();
        let (session, _id) = Session::new(tx);
        session.set_state(SessionState::Open).await;
        manager.register(session).await;

        manager.sweep_keepalive().await;
        let needs_ping = manager.sweep_keepalive().await;

        assert!(needs_ping.is_empty());
        assert_eq!(manager.count().await, 0);
    }

    #[tokio::test]
    async fn test_mark_alive_survives_sweep() {
        let manager = SessionManager::new();
        let (tx, _rx) = channel();
        let (session, _id) = Session::new(tx);
        session.set_state(SessionState::Open).await;
        manager.register(session.clone()).await;

        manager.sweep_keepalive().await;
        session.mark_alive();
        let needs_ping = manager.sweep_keepalive().await;

        assert_eq!(needs_ping.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_closes_the_session_transport() {
        let manager = SessionManager::new();
        let (tx, _rx) = channel();
        let (session, id) = Session::new(tx);
        manager.register(session.clone()).await;

        manager.unregister(id).await;

        tokio::time::timeout(std::time::Duration::from_millis(100), session.closed())
            .await
            .expect("close signal must fire once unregistered");
    }

    #[tokio::test]
    async fn test_sweep_keepalive_closes_transport_of_dead_session() {
        let manager = SessionManager::new();
        let (tx, _rx) = channel();
        let (session, _id) = Session::new(tx);
        session.set_state(SessionState::Open).await;
        manager.register(session.clone()).await;

        manager.sweep_keepalive().await; // first miss: still alive=true
        manager.sweep_keepalive().await; // second miss: reaped

        assert_eq!(session.state().await, SessionState::Dead);
        tokio::time::timeout(std::time::Duration::from_millis(100), session.closed())
            .await
            .expect("reaped session must have its transport closed");
    }
}
