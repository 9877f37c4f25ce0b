//! Unified error handling for driftd.
//!
//! The dispatcher surfaces errors to the originating client only; partners
//! never observe a counterpart's failure unless it ends in disconnection.
//! Each error kind knows its metrics/log label and which outbound event (if
//! any) it turns into.

use crate::store::StoreError;
use drift_proto::ServerEvent;
use thiserror::Error;

// ============================================================================
// Dispatch Errors (event processing)
// ============================================================================

/// Errors that can occur while handling an inbound event.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The connection never completed `user-join`.
    #[error("no session bound to this connection")]
    SessionRequired,

    /// The event requires membership in a live pair in `chatting` state.
    #[error("not in an active chat session")]
    NotInChat,

    #[error("message is empty")]
    EmptyMessage,

    #[error("message exceeds {0} characters")]
    MessageTooLong(usize),

    /// The presented session id is live on a different connection.
    #[error("session is active on another connection")]
    SessionOwnedElsewhere,

    /// The connection already carries a different, non-idle session.
    #[error("connection already owns an active session")]
    ConnectionBusy,

    /// `join-queue` while already a member of a live pair.
    #[error("already in an active chat")]
    AlreadyInChat,

    /// Message history could not be read.
    #[error("history unavailable: {0}")]
    History(#[source] StoreError),

    /// Invariant breach inside the pair registry. The offending operation
    /// is refused; the connection survives.
    #[error(transparent)]
    Pair(#[from] PairError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SessionRequired => "session_required",
            Self::NotInChat => "not_in_chat",
            Self::EmptyMessage => "empty_message",
            Self::MessageTooLong(_) => "message_too_long",
            Self::SessionOwnedElsewhere => "session_owned_elsewhere",
            Self::ConnectionBusy => "connection_busy",
            Self::AlreadyInChat => "already_in_chat",
            Self::History(_) => "history_unavailable",
            Self::Pair(_) => "pair_violation",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Convert to the outbound event delivered to the originator.
    ///
    /// Returns `None` for errors that don't warrant a client-visible reply
    /// (internal invariant breaches are logged only).
    pub fn to_event(&self) -> Option<ServerEvent> {
        match self {
            Self::SessionRequired => Some(ServerEvent::Error {
                message: "Identify with user-join first".to_string(),
            }),
            Self::NotInChat => Some(ServerEvent::MessageError {
                error: "Not in an active chat session".to_string(),
            }),
            Self::EmptyMessage => Some(ServerEvent::MessageError {
                error: "Message cannot be empty".to_string(),
            }),
            Self::MessageTooLong(limit) => Some(ServerEvent::MessageError {
                error: format!("Message exceeds the {limit} character limit"),
            }),
            Self::SessionOwnedElsewhere => Some(ServerEvent::Error {
                message: "Session is active on another connection".to_string(),
            }),
            Self::ConnectionBusy => Some(ServerEvent::Error {
                message: "Connection already has an active session".to_string(),
            }),
            Self::AlreadyInChat => Some(ServerEvent::Error {
                message: "Already in an active chat session".to_string(),
            }),
            Self::History(_) => Some(ServerEvent::MessagesError {
                error: "Failed to load messages".to_string(),
            }),
            Self::Pair(_) => None,
            Self::Internal(_) => None,
        }
    }
}

impl From<crate::state::PresenceError> for DispatchError {
    fn from(e: crate::state::PresenceError) -> Self {
        use crate::state::PresenceError;
        match e {
            PresenceError::SessionOwnedElsewhere(_) => Self::SessionOwnedElsewhere,
            PresenceError::ConnectionBusy(_) => Self::ConnectionBusy,
            PresenceError::UnknownConnection => Self::Internal("connection not registered".into()),
        }
    }
}

/// Result type for event handlers.
pub type DispatchResult = Result<(), DispatchError>;

// ============================================================================
// Pair Errors (registry operations)
// ============================================================================

/// Pair registry operation errors.
///
/// These represent refused state transitions; callers decide whether they
/// are client-visible (usually not) or recovery points (reconnect falls
/// back to a fresh join on `NotRestorable`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairError {
    #[error("unknown pair")]
    UnknownPair,

    #[error("session {0} is already a member of a live pair")]
    AlreadyPaired(String),

    #[error("connection is not a member of this pair")]
    NotAMember,

    #[error("pair is not restorable")]
    NotRestorable,
}

impl PairError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownPair => "unknown_pair",
            Self::AlreadyPaired(_) => "already_paired",
            Self::NotAMember => "not_a_member",
            Self::NotRestorable => "not_restorable",
        }
    }
}
