//! drift-proto - wire protocol for the Drift coordination server.
//!
//! Defines the event vocabulary spoken over the WebSocket transport
//! ([`ClientEvent`] inbound, [`ServerEvent`] outbound), the chat message
//! model shared with the message store, and the interest-normalization
//! helpers the matchmaker relies on.
//!
//! Every frame on the wire is a JSON object of the form
//! `{"event": "<name>", "data": <payload>}`; events without a payload omit
//! the `data` key entirely.

pub mod events;
pub mod message;

pub use events::{
    ClientEvent, DisconnectReason, GetMessagesPayload, JoinQueuePayload, Mode, ModerationAction,
    ReportUserPayload, SendMessagePayload, ServerEvent, UserJoinPayload,
};
pub use message::{ChatMessage, MessageStatus, MessageType};

use thiserror::Error;

/// Hard ceiling on chat message content length, in characters.
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Maximum number of interests a session may carry.
pub const MAX_INTERESTS: usize = 10;

/// Protocol-level decode failures.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Normalize a single interest tag: trim whitespace and lowercase.
///
/// Returns `None` when the tag is empty after trimming.
pub fn normalize_interest(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalize an interest list: trim, lowercase, drop empties, de-duplicate
/// preserving first occurrence, and cap at [`MAX_INTERESTS`].
pub fn normalize_interests<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in raw {
        if let Some(normalized) = normalize_interest(tag.as_ref()) {
            if !out.contains(&normalized) {
                out.push(normalized);
            }
            if out.len() == MAX_INTERESTS {
                break;
            }
        }
    }
    out
}

/// Intersection of two already-normalized interest lists, in `a`'s order.
pub fn common_interests(a: &[String], b: &[String]) -> Vec<String> {
    a.iter().filter(|tag| b.contains(tag)).cloned().collect()
}
