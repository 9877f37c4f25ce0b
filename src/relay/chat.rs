//! ChatRelay - validated message save and fan-out to the partner only.
//!
//! Every message runs through the moderator before anything is persisted
//! or delivered; blocked content is never echoed to the partner. Store
//! failures degrade rather than kill the relay path.

use crate::error::{DispatchError, DispatchResult};
use crate::state::{ConnId, Core, PairState};
use crate::store::StoreError;
use drift_proto::{
    ChatMessage, DisconnectReason, GetMessagesPayload, ModerationAction, SendMessagePayload,
    ServerEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// TTL on a typing flag in the hot store.
const TYPING_TTL: Duration = Duration::from_secs(10);

/// Recent-list depth kept per room in the hot store.
const RECENT_KEEP: usize = 100;

/// Delay between `moderation-kick` and the forced close, so the client
/// can render the notice.
const KICK_DELAY: Duration = Duration::from_millis(500);

/// Default and ceiling for `get-messages` page sizes.
const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 200;

/// Handle `send-message`.
pub async fn send_message(
    core: &Arc<Core>,
    conn_id: ConnId,
    payload: SendMessagePayload,
) -> DispatchResult {
    let session = core.session_for(conn_id)?;
    let pair = core
        .pairs
        .pair_for_session(&session.session_id)
        .filter(|p| p.state == PairState::Chatting)
        .ok_or(DispatchError::NotInChat)?;

    let content = payload.content.trim();
    if content.is_empty() {
        return Err(DispatchError::EmptyMessage);
    }
    let max_len = core.config.limits.max_message_len;
    if content.chars().count() > max_len {
        return Err(DispatchError::MessageTooLong(max_len));
    }

    let verdict = core.moderator.check(content, &session.session_id).await;
    if !verdict.allowed {
        core.send_to(
            conn_id,
            ServerEvent::MessageBlocked {
                reason: verdict.reason().to_string(),
                categories: verdict.categories.clone(),
                action: verdict.action,
            },
        );
        match verdict.action {
            ModerationAction::Warning => {
                core.send_to(
                    conn_id,
                    ServerEvent::ModerationWarning {
                        message: "Repeated violations will end your chat".to_string(),
                        flag_count: verdict.flag_count,
                    },
                );
            }
            ModerationAction::Kick => {
                kick(core, conn_id, &session.session_id, &pair.id).await;
            }
            ModerationAction::None => {}
        }
        return Ok(());
    }

    let partner = pair
        .partner_of(&session.session_id)
        .ok_or_else(|| DispatchError::Internal("pair without a partner".into()))?
        .clone();

    let message = ChatMessage::new(
        pair.id.clone(),
        session.session_id.clone(),
        partner.session_id.clone(),
        content,
        payload.message_type.unwrap_or_default(),
        core.config.limits.message_expiry_hours as i64,
    );

    let stored = match core.messages.save(message.clone()).await {
        Ok(stored) => stored,
        Err(StoreError::ContentTooLong(limit)) => {
            return Err(DispatchError::MessageTooLong(limit));
        }
        Err(e) => {
            // Best effort: the conversation continues on a transient id.
            warn!(room = %pair.id, error = %e, "Message save failed, relaying unpersisted");
            message
        }
    };

    cache_recent(core, &pair.id, &stored).await;

    core.send_to(partner.conn_id, ServerEvent::MessageReceived(stored.clone()));
    core.send_to(conn_id, ServerEvent::MessageSent(stored));
    Ok(())
}

/// Push the stored form onto the room's recent-list. Cache errors are
/// swallowed; the durable store is authoritative.
async fn cache_recent(core: &Arc<Core>, room_id: &str, stored: &ChatMessage) {
    let Ok(entry) = serde_json::to_string(stored) else {
        return;
    };
    if let Err(e) = core.hot.push_recent(room_id, entry).await {
        debug!(room = %room_id, error = %e, "Recent-list push failed");
        return;
    }
    if let Err(e) = core.hot.trim_recent(room_id, RECENT_KEEP).await {
        debug!(room = %room_id, error = %e, "Recent-list trim failed");
    }
    if let Err(e) = core.hot.expire_recent(room_id, core.room_ttl()).await {
        debug!(room = %room_id, error = %e, "Recent-list expire failed");
    }
}

/// Escalation endpoint: notify, dissolve the pair, then close the
/// connection after a short delay.
async fn kick(core: &Arc<Core>, conn_id: ConnId, session_id: &str, pair_id: &str) {
    info!(session = %session_id, "Kicking session for repeated violations");
    core.send_to(
        conn_id,
        ServerEvent::ModerationKick {
            message: "You have been removed for repeated violations".to_string(),
        },
    );
    if let Err(e) = core
        .dissolve_pair(pair_id, DisconnectReason::Left, session_id)
        .await
    {
        debug!(pair = %pair_id, code = e.error_code(), "Kick found no pair to dissolve");
    }

    let core = Arc::clone(core);
    tokio::spawn(async move {
        tokio::time::sleep(KICK_DELAY).await;
        core.presence.cancel(conn_id);
    });
}

/// Handle `typing` / `stop-typing`. Idempotent; a flag outside an active
/// chat is silently dropped.
pub async fn set_typing(core: &Arc<Core>, conn_id: ConnId, typing: bool) -> DispatchResult {
    let session = core.session_for(conn_id)?;
    let Some(pair) = core
        .pairs
        .pair_for_session(&session.session_id)
        .filter(|p| p.state == PairState::Chatting)
    else {
        return Ok(());
    };

    let result = if typing {
        core.hot
            .set_typing(&pair.id, &session.session_id, TYPING_TTL)
            .await
    } else {
        core.hot.clear_typing(&pair.id, &session.session_id).await
    };
    if let Err(e) = result {
        debug!(room = %pair.id, error = %e, "Typing flag update failed");
    }

    if let Some(partner) = pair.partner_of(&session.session_id) {
        core.send_to(partner.conn_id, ServerEvent::PartnerTyping(typing));
    }
    Ok(())
}

/// Handle `get-messages`. History stays readable through a grace window.
pub async fn load_messages(
    core: &Arc<Core>,
    conn_id: ConnId,
    payload: GetMessagesPayload,
) -> DispatchResult {
    let session = core.session_for(conn_id)?;
    let pair = core
        .pairs
        .pair_for_session(&session.session_id)
        .ok_or(DispatchError::NotInChat)?;

    let limit = payload
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let skip = payload.skip.unwrap_or(0);

    let messages = core
        .messages
        .list_by_room(&pair.id, limit, skip)
        .await
        .map_err(DispatchError::History)?;

    core.send_to(
        conn_id,
        ServerEvent::MessagesLoaded {
            messages,
            room_id: pair.id,
        },
    );
    Ok(())
}

/// Handle `mark-messages-read`.
pub async fn mark_read(core: &Arc<Core>, conn_id: ConnId) -> DispatchResult {
    let session = core.session_for(conn_id)?;
    let pair = core
        .pairs
        .pair_for_session(&session.session_id)
        .ok_or(DispatchError::NotInChat)?;

    let count = core
        .messages
        .mark_read(&pair.id, &session.session_id)
        .await
        .map_err(DispatchError::History)?;

    core.send_to(
        conn_id,
        ServerEvent::MessagesMarkedRead {
            count,
            room_id: pair.id.clone(),
        },
    );
    if let Some(partner) = pair.partner_of(&session.session_id) {
        core.send_to(
            partner.conn_id,
            ServerEvent::MessagesReadByPartner {
                read_by: session.session_id.clone(),
                count,
            },
        );
    }
    Ok(())
}

/// Handle `disconnect-chat`: voluntary end. Idempotent when no pair is
/// live; forgives the leaver's violation counter.
pub async fn leave_chat(core: &Arc<Core>, conn_id: ConnId) -> DispatchResult {
    let session = core.session_for(conn_id)?;
    let Some(pair) = core.pairs.pair_for_session(&session.session_id) else {
        return Ok(());
    };

    match core
        .dissolve_pair(&pair.id, DisconnectReason::Left, &session.session_id)
        .await
    {
        Ok(()) => core.moderator.reset_flags(&session.session_id),
        Err(e) => debug!(pair = %pair.id, code = e.error_code(), "Leave found no pair"),
    }
    Ok(())
}
