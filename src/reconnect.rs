//! Reconnector - binds a new connection to a pre-existing session within
//! grace, and owns the teardown path for transport close.
//!
//! A `user-join` carrying a session id whose pair is in grace rebinds the
//! session to the new connection and restores the pair; any failure along
//! the way falls back to treating the join as fresh. A disconnect with no
//! pair does not open a grace window - the queue entry and the session are
//! simply discarded.

use crate::state::{ConnId, Core, PairState, SessionState};
use drift_proto::ServerEvent;
use std::sync::Arc;
use tracing::{debug, info};

/// A successfully restored pairing.
pub struct Restored {
    pub room_id: String,
    pub partner_session: String,
}

/// Attempt to restore a graced pair for a rejoining session.
///
/// Returns `None` when there is nothing to restore (unknown session, no
/// pair, pair not in grace, or the session is not the absent member); the
/// caller then proceeds with a fresh bind.
pub fn try_restore(core: &Arc<Core>, conn_id: ConnId, session_id: &str) -> Option<Restored> {
    let pair = core
        .pairs
        .pair_for_session(session_id)
        .filter(|p| p.state == PairState::Grace && p.absent.as_deref() == Some(session_id))?;

    if let Err(e) = core.presence.rebind(conn_id, session_id) {
        debug!(session = %session_id, error = %e, "Rebind refused, treating join as fresh");
        return None;
    }

    let restored = match core.pairs.restore(&pair.id, session_id, conn_id) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            // Dissolved (or restored elsewhere) between lookup and restore.
            debug!(pair = %pair.id, code = e.error_code(), "Restore refused, treating join as fresh");
            return None;
        }
    };

    core.presence.set_state(session_id, SessionState::Chatting);
    core.moderator.reset_flags(session_id);

    let partner = restored.partner_of(session_id)?;
    info!(
        session = %session_id,
        partner = %partner.session_id,
        room = %restored.id,
        "Session reconnected within grace"
    );

    core.send_to(
        conn_id,
        ServerEvent::ReconnectSuccess {
            match_restored: true,
            room_id: restored.id.clone(),
            partner_id: partner.session_id.clone(),
        },
    );
    core.send_to(
        partner.conn_id,
        ServerEvent::PartnerReconnected {
            partner_id: session_id.to_string(),
            room_id: restored.id.clone(),
        },
    );

    Some(Restored {
        room_id: restored.id.clone(),
        partner_session: partner.session_id.clone(),
    })
}

/// Teardown for a closed transport (remote close, eviction, or forced
/// cancel). Opens a grace window when the session was in an active pair;
/// otherwise disposes of the session outright.
pub async fn grace_or_dispose(core: &Arc<Core>, conn_id: ConnId) {
    core.queues.remove(conn_id);

    let Some(removed) = core.presence.remove(conn_id) else {
        return;
    };
    let Some(session) = removed.session else {
        debug!(conn = %conn_id, "Unbound connection closed");
        return;
    };

    match core.pairs.pair_for_session(&session.session_id) {
        Some(pair) if pair.state == PairState::Grace => {
            // The retained member of a graced pair is leaving too; nobody
            // is left to notify.
            info!(
                session = %session.session_id,
                pair = %pair.id,
                "Retained member left during grace, dissolving"
            );
            core.dissolve_pair_silent(&pair.id).await;
        }
        Some(pair) => {
            info!(
                session = %session.session_id,
                pair = %pair.id,
                "Member disconnected, opening grace window"
            );
            core.begin_grace(&pair.id, &session.session_id);
        }
        None => {
            debug!(session = %session.session_id, "Session disposed on disconnect");
            core.presence.remove_session(&session.session_id);
            core.moderator.forget(&session.session_id);
        }
    }
}
