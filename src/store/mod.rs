//! External collaborator interfaces.
//!
//! The core never owns message persistence or the hot cache; it talks to
//! them through these traits. [`memory`] ships in-process implementations
//! used by the default bootstrap and the integration tests; a deployment
//! can swap in network-backed providers without touching the relay.

pub mod memory;

use async_trait::async_trait;
use drift_proto::ChatMessage;
use std::time::Duration;
use thiserror::Error;

/// Store-level failures.
///
/// Relay paths degrade rather than die on these: a failed save becomes a
/// best-effort `message-sent`, typing-flag errors are swallowed, history
/// reads surface as `messages-error`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content exceeds {0} characters")]
    ContentTooLong(usize),

    #[error("store backend unavailable: {0}")]
    Backend(String),
}

/// Durable chat message storage, keyed by room.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message. Returns the stored form (the one fanned out).
    async fn save(&self, message: ChatMessage) -> Result<ChatMessage, StoreError>;

    /// Page through a room's messages in chronological order. `skip` and
    /// `limit` count from the newest message backwards, so `skip = 0`
    /// yields the latest page.
    async fn list_by_room(
        &self,
        room_id: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    /// Advance every message in `room_id` addressed to `reader` with status
    /// `sent` or `delivered` to `read`. Returns how many were advanced.
    async fn mark_read(&self, room_id: &str, reader: &str) -> Result<u64, StoreError>;

    /// Schedule deletion of the room's messages after `ttl`. Re-scheduling
    /// replaces any earlier deadline.
    async fn schedule_expiry(&self, room_id: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Drop a room's messages immediately.
    async fn delete_room(&self, room_id: &str) -> Result<(), StoreError>;
}

/// Hot cache: recent-message lists per room plus short-lived typing flags.
#[async_trait]
pub trait HotStore: Send + Sync {
    async fn push_recent(&self, room_id: &str, entry: String) -> Result<(), StoreError>;

    /// Keep only the newest `keep` entries of a room's recent list.
    async fn trim_recent(&self, room_id: &str, keep: usize) -> Result<(), StoreError>;

    async fn expire_recent(&self, room_id: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn set_typing(
        &self,
        room_id: &str,
        session_id: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn clear_typing(&self, room_id: &str, session_id: &str) -> Result<(), StoreError>;
}
