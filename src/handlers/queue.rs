//! Queue handling: `join-queue`, `leave-queue`, `skip-user`.
//!
//! A join scans the waiting pool and either pairs immediately or parks the
//! session with a `queue-status`. When the selected candidate turns out to
//! have vanished (disconnect racing the match), the requester simply
//! re-enters selection.

use crate::error::{DispatchError, DispatchResult};
use crate::state::core::EstablishOutcome;
use crate::state::{ConnId, Core, EnqueueOutcome, QueueEntry, SessionState};
use drift_proto::{normalize_interests, DisconnectReason, JoinQueuePayload, ServerEvent};
use std::sync::Arc;
use tracing::debug;

/// Seconds of estimated wait advertised per queue position.
const WAIT_ESTIMATE_PER_POSITION_SECS: u64 = 10;

pub async fn join_queue(
    core: &Arc<Core>,
    conn_id: ConnId,
    payload: JoinQueuePayload,
) -> DispatchResult {
    let session = core.session_for(conn_id)?;
    if core.pairs.pair_for_session(&session.session_id).is_some() {
        return Err(DispatchError::AlreadyInChat);
    }

    // An empty interest list reuses whatever the session declared at join.
    let interests = if payload.interests.is_empty() {
        session.interests.clone()
    } else {
        normalize_interests(&payload.interests)
    };
    let mode = payload.mode.unwrap_or(session.mode);
    core.presence.update_session(&session.session_id, |s| {
        s.interests = interests.clone();
        s.mode = mode;
    });

    loop {
        let entry = QueueEntry::new(
            session.session_id.clone(),
            conn_id,
            interests.clone(),
            mode,
        );
        match core.queues.enqueue(entry.clone()) {
            EnqueueOutcome::Queued { position } => {
                core.presence
                    .set_state(&session.session_id, SessionState::Queued);
                core.send_to(
                    conn_id,
                    ServerEvent::QueueStatus {
                        position,
                        estimated_wait: position as u64 * WAIT_ESTIMATE_PER_POSITION_SECS,
                        message: "Waiting for a partner...".to_string(),
                    },
                );
                return Ok(());
            }
            EnqueueOutcome::Matched { candidate } => {
                match core.establish_pair(&entry, candidate).await {
                    EstablishOutcome::Established => return Ok(()),
                    EstablishOutcome::CandidateGone => {
                        debug!(session = %session.session_id, "Retrying match after candidate loss");
                        continue;
                    }
                    EstablishOutcome::Aborted => return Ok(()),
                }
            }
        }
    }
}

pub fn leave_queue(core: &Arc<Core>, conn_id: ConnId) -> DispatchResult {
    let session = core.session_for(conn_id)?;
    core.queues.remove(conn_id);
    if session.state == SessionState::Queued {
        core.presence
            .set_state(&session.session_id, SessionState::Idle);
    }
    Ok(())
}

/// `skip-user`: end the current pair and confirm. Idempotent - skipping
/// with no live pair still confirms, so a client can always advance.
pub async fn skip_user(core: &Arc<Core>, conn_id: ConnId) -> DispatchResult {
    let session = core.session_for(conn_id)?;

    if let Some(pair) = core.pairs.pair_for_session(&session.session_id) {
        match core
            .dissolve_pair(&pair.id, DisconnectReason::Skipped, &session.session_id)
            .await
        {
            Ok(()) => core.moderator.reset_flags(&session.session_id),
            // Lost a race with another dissolve; the skip still stands.
            Err(e) => debug!(pair = %pair.id, code = e.error_code(), "Skip found no pair"),
        }
    }

    core.send_to(conn_id, ServerEvent::SkipConfirmed);
    Ok(())
}
