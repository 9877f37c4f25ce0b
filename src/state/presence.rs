//! Presence - authoritative map of connected clients and session bindings.
//!
//! Two mappings live under one lock: connection id -> entry (with the
//! outbound sender) and session id -> session. Keeping them under a single
//! `RwLock` means a reader always observes a fully updated session or none,
//! and the two maps can never disagree about a binding.
//!
//! A session in grace has `conn_id = None`; the session entry survives so a
//! reconnecting client can be recognized and rebound.

use drift_proto::{Mode, ServerEvent};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Unique identifier for a connection, assigned on accept.
pub type ConnId = Uuid;

/// Where a session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Queued,
    Matched,
    Chatting,
    InGrace,
}

/// The durable identity a client chooses via `user-join`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    /// Live connection carrying this session, `None` while in grace.
    pub conn_id: Option<ConnId>,
    pub interests: Vec<String>,
    pub mode: Mode,
    pub state: SessionState,
}

/// Per-connection bookkeeping: the outbound channel, the force-close token,
/// and heartbeat counters.
pub struct ConnEntry {
    pub sender: mpsc::Sender<ServerEvent>,
    pub cancel: CancellationToken,
    pub session_id: Option<String>,
    pub last_pong: Instant,
    pub missed_pings: u32,
}

/// Binding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresenceError {
    /// The presented session id is live on another connection.
    #[error("session {0} is bound to another live connection")]
    SessionOwnedElsewhere(String),

    /// The connection already carries a different, non-idle session.
    #[error("connection already bound to session {0}")]
    ConnectionBusy(String),

    /// The connection is not (or no longer) registered.
    #[error("unknown connection")]
    UnknownConnection,
}

#[derive(Default)]
struct Inner {
    conns: HashMap<ConnId, ConnEntry>,
    sessions: HashMap<String, Session>,
}

/// The presence map. All mutations are serialized by the inner lock; the
/// lock is never held across an await point.
#[derive(Default)]
pub struct Presence {
    inner: RwLock<Inner>,
}

/// What `remove` found for the departing connection.
pub struct RemovedConn {
    /// The session that was bound to it, already detached (`conn_id = None`),
    /// still present in the session map. Callers decide whether it enters
    /// grace or is disposed via [`Presence::remove_session`].
    pub session: Option<Session>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection.
    pub fn accept(
        &self,
        conn_id: ConnId,
        sender: mpsc::Sender<ServerEvent>,
        cancel: CancellationToken,
    ) {
        self.inner.write().conns.insert(
            conn_id,
            ConnEntry {
                sender,
                cancel,
                session_id: None,
                last_pong: Instant::now(),
                missed_pings: 0,
            },
        );
    }

    /// Bind a session identity to a connection.
    ///
    /// Idempotent for the same (connection, session) pair; `interests` and
    /// `mode` update the session when provided. A session live on another
    /// connection fails with [`PresenceError::SessionOwnedElsewhere`] -
    /// grace takeovers go through [`Presence::rebind`] instead.
    pub fn bind(
        &self,
        conn_id: ConnId,
        session_id: &str,
        interests: Option<Vec<String>>,
        mode: Option<Mode>,
    ) -> Result<Session, PresenceError> {
        let mut inner = self.inner.write();

        let current = inner
            .conns
            .get(&conn_id)
            .ok_or(PresenceError::UnknownConnection)?
            .session_id
            .clone();

        if let Some(existing) = current
            && existing != session_id
        {
            // Switching identity is only allowed while the old one is idle.
            match inner.sessions.get(&existing) {
                Some(old) if old.state != SessionState::Idle => {
                    return Err(PresenceError::ConnectionBusy(existing));
                }
                _ => {
                    inner.sessions.remove(&existing);
                }
            }
        }

        if let Some(owner) = inner
            .sessions
            .get(session_id)
            .and_then(|s| s.conn_id)
            .filter(|owner| *owner != conn_id)
            && inner.conns.contains_key(&owner)
        {
            return Err(PresenceError::SessionOwnedElsewhere(session_id.to_string()));
        }

        let session = inner
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                session_id: session_id.to_string(),
                conn_id: None,
                interests: Vec::new(),
                mode: Mode::default(),
                state: SessionState::Idle,
            });

        session.conn_id = Some(conn_id);
        if let Some(interests) = interests {
            session.interests = interests;
        }
        if let Some(mode) = mode {
            session.mode = mode;
        }
        let snapshot = session.clone();

        if let Some(entry) = inner.conns.get_mut(&conn_id) {
            entry.session_id = Some(session_id.to_string());
        }
        Ok(snapshot)
    }

    /// Rebind a session to a new connection. Reconnector-only takeover: the
    /// session must exist, and must not be live on another connection.
    pub fn rebind(&self, new_conn: ConnId, session_id: &str) -> Result<Session, PresenceError> {
        let mut inner = self.inner.write();

        if !inner.conns.contains_key(&new_conn) {
            return Err(PresenceError::UnknownConnection);
        }
        let live_owner = inner
            .sessions
            .get(session_id)
            .ok_or(PresenceError::UnknownConnection)?
            .conn_id
            .filter(|owner| *owner != new_conn && inner.conns.contains_key(owner));
        if live_owner.is_some() {
            return Err(PresenceError::SessionOwnedElsewhere(session_id.to_string()));
        }

        let session = inner
            .sessions
            .get_mut(session_id)
            .expect("session checked above");
        session.conn_id = Some(new_conn);
        let snapshot = session.clone();

        if let Some(entry) = inner.conns.get_mut(&new_conn) {
            entry.session_id = Some(session_id.to_string());
        }
        Ok(snapshot)
    }

    /// Session bound to a connection, if any.
    pub fn get(&self, conn_id: ConnId) -> Option<Session> {
        let inner = self.inner.read();
        let session_id = inner.conns.get(&conn_id)?.session_id.as_ref()?;
        inner.sessions.get(session_id).cloned()
    }

    /// Session by its id.
    pub fn get_by_session(&self, session_id: &str) -> Option<Session> {
        self.inner.read().sessions.get(session_id).cloned()
    }

    /// Apply a patch to a session. Returns the updated snapshot.
    pub fn update_session(
        &self,
        session_id: &str,
        patch: impl FnOnce(&mut Session),
    ) -> Option<Session> {
        let mut inner = self.inner.write();
        let session = inner.sessions.get_mut(session_id)?;
        patch(session);
        Some(session.clone())
    }

    /// Move a session to a new lifecycle state.
    pub fn set_state(&self, session_id: &str, state: SessionState) {
        self.update_session(session_id, |s| s.state = state);
    }

    /// Unregister a connection. The bound session (if any) is detached but
    /// kept in the session map; the caller routes it into grace or removes
    /// it with [`Presence::remove_session`].
    pub fn remove(&self, conn_id: ConnId) -> Option<RemovedConn> {
        let mut inner = self.inner.write();
        let entry = inner.conns.remove(&conn_id)?;
        let session = entry.session_id.and_then(|sid| {
            let session = inner.sessions.get_mut(&sid)?;
            if session.conn_id == Some(conn_id) {
                session.conn_id = None;
            }
            Some(session.clone())
        });
        Some(RemovedConn { session })
    }

    /// Drop a session entirely.
    pub fn remove_session(&self, session_id: &str) {
        self.inner.write().sessions.remove(session_id);
    }

    /// Record a pong: reset the missed counter and stamp the arrival.
    pub fn record_pong(&self, conn_id: ConnId) {
        if let Some(entry) = self.inner.write().conns.get_mut(&conn_id) {
            entry.last_pong = Instant::now();
            entry.missed_pings = 0;
        }
    }

    /// Bump the missed-ping counter, returning the new value.
    pub fn increment_missed_pings(&self, conn_id: ConnId) -> Option<u32> {
        let mut inner = self.inner.write();
        let entry = inner.conns.get_mut(&conn_id)?;
        entry.missed_pings += 1;
        Some(entry.missed_pings)
    }

    /// Time since the last pong (or since accept, if none arrived yet).
    pub fn idle_for(&self, conn_id: ConnId) -> Option<std::time::Duration> {
        self.inner
            .read()
            .conns
            .get(&conn_id)
            .map(|e| e.last_pong.elapsed())
    }

    /// Queue an event to a connection's writer.
    ///
    /// Never blocks. A full channel means the consumer is too slow to be
    /// healthy: the connection is cancelled and `false` is returned.
    pub fn send_to(&self, conn_id: ConnId, event: ServerEvent) -> bool {
        let inner = self.inner.read();
        let Some(entry) = inner.conns.get(&conn_id) else {
            return false;
        };
        match entry.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(conn_id = %conn_id, event = event.name(), "Outbound channel full, closing connection");
                entry.cancel.cancel();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Force-close a connection; the reader unwinds and runs the normal
    /// disconnect path.
    pub fn cancel(&self, conn_id: ConnId) {
        if let Some(entry) = self.inner.read().conns.get(&conn_id) {
            entry.cancel.cancel();
        }
    }

    /// Ids of every live connection.
    pub fn connection_ids(&self) -> Vec<ConnId> {
        self.inner.read().conns.keys().copied().collect()
    }

    /// Live connection ids as a set, for the queue sweeper.
    pub fn live_set(&self) -> HashSet<ConnId> {
        self.inner.read().conns.keys().copied().collect()
    }

    /// (connections, sessions) counts for the stats snapshot.
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.read();
        (inner.conns.len(), inner.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(presence: &Presence) -> (ConnId, mpsc::Receiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(8);
        presence.accept(conn_id, tx, CancellationToken::new());
        (conn_id, rx)
    }

    #[test]
    fn bind_is_idempotent_and_mirrored() {
        let presence = Presence::new();
        let (conn, _rx) = accepted(&presence);

        presence
            .bind(conn, "alice", Some(vec!["music".into()]), Some(Mode::Text))
            .unwrap();
        presence.bind(conn, "alice", None, None).unwrap();

        // conn -> session and session -> conn stay in lockstep.
        let by_conn = presence.get(conn).unwrap();
        let by_session = presence.get_by_session("alice").unwrap();
        assert_eq!(by_conn.session_id, "alice");
        assert_eq!(by_session.conn_id, Some(conn));
        assert_eq!(by_conn.interests, vec!["music"]);
    }

    #[test]
    fn conflicting_bind_is_refused() {
        let presence = Presence::new();
        let (conn_a, _rx_a) = accepted(&presence);
        let (conn_b, _rx_b) = accepted(&presence);

        presence.bind(conn_a, "alice", None, None).unwrap();
        assert_eq!(
            presence.bind(conn_b, "alice", None, None),
            Err(PresenceError::SessionOwnedElsewhere("alice".into()))
        );
    }

    #[test]
    fn switching_identity_requires_idle() {
        let presence = Presence::new();
        let (conn, _rx) = accepted(&presence);

        presence.bind(conn, "alice", None, None).unwrap();
        presence.set_state("alice", SessionState::Queued);
        assert_eq!(
            presence.bind(conn, "bob", None, None),
            Err(PresenceError::ConnectionBusy("alice".into()))
        );

        presence.set_state("alice", SessionState::Idle);
        presence.bind(conn, "bob", None, None).unwrap();
        assert!(presence.get_by_session("alice").is_none());
        assert_eq!(presence.get(conn).unwrap().session_id, "bob");
    }

    #[test]
    fn remove_detaches_but_keeps_the_session() {
        let presence = Presence::new();
        let (conn, _rx) = accepted(&presence);
        presence.bind(conn, "alice", None, None).unwrap();

        let removed = presence.remove(conn).unwrap();
        assert_eq!(removed.session.unwrap().session_id, "alice");

        let orphan = presence.get_by_session("alice").unwrap();
        assert_eq!(orphan.conn_id, None);

        // A new connection can take the orphan over via rebind.
        let (conn2, _rx2) = accepted(&presence);
        let rebound = presence.rebind(conn2, "alice").unwrap();
        assert_eq!(rebound.conn_id, Some(conn2));
        assert_eq!(presence.get(conn2).unwrap().session_id, "alice");
    }

    #[test]
    fn missed_ping_accounting() {
        let presence = Presence::new();
        let (conn, _rx) = accepted(&presence);

        assert_eq!(presence.increment_missed_pings(conn), Some(1));
        assert_eq!(presence.increment_missed_pings(conn), Some(2));
        presence.record_pong(conn);
        assert_eq!(presence.increment_missed_pings(conn), Some(1));
    }

    #[test]
    fn send_to_full_channel_cancels_the_connection() {
        let presence = Presence::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        presence.accept(conn, tx, cancel.clone());

        assert!(presence.send_to(conn, ServerEvent::Ping));
        assert!(!presence.send_to(conn, ServerEvent::Ping));
        assert!(cancel.is_cancelled());
    }
}
