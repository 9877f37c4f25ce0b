//! SignalingRelay - stateless forwarding of WebRTC frames.
//!
//! Offer, answer, and ICE candidates are opaque payloads; the relay only
//! checks pair membership, attaches the sender's session id, and forwards.
//! ICE may interleave with offer/answer in any order, so all three events
//! are relayed in both `matched` and `chatting` (never in `grace`, where
//! the partner has no live connection).

use crate::error::{DispatchError, DispatchResult};
use crate::state::{ConnId, Core, PairState};
use drift_proto::ServerEvent;
use serde_json::Value;
use std::sync::Arc;

pub fn relay_offer(core: &Arc<Core>, conn_id: ConnId, offer: Value) -> DispatchResult {
    relay(core, conn_id, offer, |payload, from| {
        ServerEvent::WebrtcOffer {
            offer: payload,
            from,
        }
    })
}

pub fn relay_answer(core: &Arc<Core>, conn_id: ConnId, answer: Value) -> DispatchResult {
    relay(core, conn_id, answer, |payload, from| {
        ServerEvent::WebrtcAnswer {
            answer: payload,
            from,
        }
    })
}

pub fn relay_ice_candidate(core: &Arc<Core>, conn_id: ConnId, candidate: Value) -> DispatchResult {
    relay(core, conn_id, candidate, |payload, from| {
        ServerEvent::WebrtcIceCandidate {
            candidate: payload,
            from,
        }
    })
}

fn relay(
    core: &Arc<Core>,
    conn_id: ConnId,
    payload: Value,
    build: impl FnOnce(Value, String) -> ServerEvent,
) -> DispatchResult {
    let session = core.session_for(conn_id)?;
    let pair = core
        .pairs
        .pair_for_session(&session.session_id)
        .filter(|p| matches!(p.state, PairState::Matched | PairState::Chatting))
        .ok_or(DispatchError::NotInChat)?;
    if !core.pairs.is_member_of(&pair.id, conn_id) {
        return Err(DispatchError::NotInChat);
    }

    let partner = pair
        .partner_of(&session.session_id)
        .ok_or_else(|| DispatchError::Internal("pair without a partner".into()))?;
    core.send_to(partner.conn_id, build(payload, session.session_id));
    Ok(())
}
