//! `user-join` handling: reconnect attempt first, fresh bind otherwise.

use crate::error::DispatchResult;
use crate::reconnect;
use crate::state::{ConnId, Core};
use drift_proto::{normalize_interests, ServerEvent, UserJoinPayload};
use std::sync::Arc;
use tracing::debug;

pub async fn user_join(
    core: &Arc<Core>,
    conn_id: ConnId,
    payload: UserJoinPayload,
) -> DispatchResult {
    let session_id = payload.session_id;

    // A session whose pair is sitting in grace gets its match back instead
    // of a fresh identity.
    if reconnect::try_restore(core, conn_id, &session_id).is_some() {
        return Ok(());
    }

    let interests = if payload.interests.is_empty() {
        None
    } else {
        Some(normalize_interests(&payload.interests))
    };

    let session = core
        .presence
        .bind(conn_id, &session_id, interests, payload.mode)?;
    debug!(conn = %conn_id, session = %session.session_id, "Session bound");

    core.send_to(
        conn_id,
        ServerEvent::SessionConfirmed {
            session_id: session.session_id,
        },
    );
    Ok(())
}
