//! The Core - root handle over the shared state graph.
//!
//! Owns the three shared mutable roots (Presence, MatchQueues,
//! PairRegistry), the moderator, and the store handles, and hosts the
//! canonical pair-lifecycle operations (establish, grace, restore support,
//! dissolve). Handlers and background workers hold an `Arc<Core>`; nothing
//! here is a process-wide global.
//!
//! # Lock Order (Deadlock Prevention)
//!
//! When acquiring multiple locks, always follow this order:
//!
//! 1. PairRegistry mutex
//! 2. Presence lock
//!
//! MatchQueues is never held together with either. No lock is ever held
//! across an await point; cross-lock work goes through snapshots.

use crate::config::Config;
use crate::error::PairError;
use crate::moderation::Moderator;
use crate::state::pairs::{PairMember, PairRegistry};
use crate::state::presence::{ConnId, Presence, Session, SessionState};
use crate::state::queues::{MatchQueues, QueueEntry};
use crate::store::{HotStore, MessageStore};
use drift_proto::{common_interests, DisconnectReason, ServerEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Shared server state and collaborators.
pub struct Core {
    pub config: Config,
    pub presence: Presence,
    pub queues: MatchQueues,
    pub pairs: PairRegistry,
    pub moderator: Moderator,
    pub messages: Arc<dyn MessageStore>,
    pub hot: Arc<dyn HotStore>,
}

/// Outcome of trying to turn a queue match into a live pair.
pub enum EstablishOutcome {
    /// Both members were notified; the pair is chatting.
    Established,
    /// The selected candidate vanished between pick and create; the caller
    /// should retry its enqueue.
    CandidateGone,
    /// The enqueuer itself went away (or an invariant refused the pair);
    /// the candidate has been re-queued if still live.
    Aborted,
}

/// Read-only snapshot of in-process core state, for logging and tests.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub connections: usize,
    pub sessions: usize,
    pub text_waiting: usize,
    pub video_waiting: usize,
    pub longest_wait_ms: u64,
    pub active_pairs: usize,
}

impl Core {
    pub fn new(config: Config, messages: Arc<dyn MessageStore>, hot: Arc<dyn HotStore>) -> Self {
        let moderator = Moderator::new(config.moderation.clone());
        let queues = MatchQueues::new(config.matchmaking.starvation_bonus());
        Self {
            config,
            presence: Presence::new(),
            queues,
            pairs: PairRegistry::new(),
            moderator,
            messages,
            hot,
        }
    }

    /// Queue an event toward a connection's writer. `false` when the
    /// connection is gone or unhealthy.
    pub fn send_to(&self, conn_id: ConnId, event: ServerEvent) -> bool {
        self.presence.send_to(conn_id, event)
    }

    /// The session bound to a connection, or a client-protocol error.
    pub fn session_for(&self, conn_id: ConnId) -> Result<Session, crate::error::DispatchError> {
        self.presence
            .get(conn_id)
            .ok_or(crate::error::DispatchError::SessionRequired)
    }

    /// TTL scheduled on a room's messages when its pair ends.
    pub fn room_ttl(&self) -> Duration {
        Duration::from_secs(self.config.limits.message_expiry_hours * 3600)
    }

    pub fn stats(&self) -> StatsSnapshot {
        let (connections, sessions) = self.presence.counts();
        let queues = self.queues.stats();
        StatsSnapshot {
            connections,
            sessions,
            text_waiting: queues.text_waiting,
            video_waiting: queues.video_waiting,
            longest_wait_ms: queues.longest_wait_ms,
            active_pairs: self.pairs.count(),
        }
    }

    /// Best-effort TTL scheduling for a finished room.
    pub async fn schedule_room_expiry(&self, room_id: &str) {
        let ttl = self.room_ttl();
        if let Err(e) = self.messages.schedule_expiry(room_id, ttl).await {
            warn!(room = %room_id, error = %e, "Failed to schedule room expiry");
        }
        if let Err(e) = self.hot.expire_recent(room_id, ttl).await {
            debug!(room = %room_id, error = %e, "Failed to expire recent-list");
        }
    }
}

// ============================================================================
// Pair lifecycle
// ============================================================================

impl Core {
    /// Turn a queue match into a live pair and notify both members.
    ///
    /// The enqueuer becomes the initiator (`sendOffer = true`). Delivery
    /// failure on either side dissolves the nascent pair; the surviving
    /// side is routed back into the queue.
    pub async fn establish_pair(
        self: &Arc<Self>,
        enqueuer: &QueueEntry,
        candidate: QueueEntry,
    ) -> EstablishOutcome {
        // The candidate was picked from the queue; its connection may have
        // raced a disconnect since.
        let candidate_live = self
            .presence
            .get_by_session(&candidate.session_id)
            .and_then(|s| s.conn_id)
            == Some(candidate.conn_id);
        if !candidate_live {
            debug!(candidate = %candidate.session_id, "Match candidate vanished before pair create");
            return EstablishOutcome::CandidateGone;
        }

        let common = common_interests(&enqueuer.interests, &candidate.interests);
        let pair = match self.pairs.create(
            PairMember {
                session_id: enqueuer.session_id.clone(),
                conn_id: enqueuer.conn_id,
            },
            PairMember {
                session_id: candidate.session_id.clone(),
                conn_id: candidate.conn_id,
            },
            enqueuer.mode,
            common,
        ) {
            Ok(pair) => pair,
            Err(PairError::AlreadyPaired(session)) if session == candidate.session_id => {
                warn!(session = %session, "Candidate already paired, retrying match");
                return EstablishOutcome::CandidateGone;
            }
            Err(e) => {
                error!(error = %e, code = e.error_code(), enqueuer = %enqueuer.session_id, "Refusing pair create");
                return EstablishOutcome::Aborted;
            }
        };

        self.presence
            .set_state(&enqueuer.session_id, SessionState::Matched);
        self.presence
            .set_state(&candidate.session_id, SessionState::Matched);

        let delivered_candidate = self.send_to(
            candidate.conn_id,
            ServerEvent::MatchFound {
                partner_id: enqueuer.session_id.clone(),
                common_interests: pair.common_interests.clone(),
                mode: pair.mode,
                send_offer: false,
                room_id: pair.id.clone(),
            },
        );
        if !delivered_candidate {
            let _ = self.pairs.dissolve(&pair.id);
            self.presence
                .set_state(&enqueuer.session_id, SessionState::Idle);
            return EstablishOutcome::CandidateGone;
        }

        let delivered_enqueuer = self.send_to(
            enqueuer.conn_id,
            ServerEvent::MatchFound {
                partner_id: candidate.session_id.clone(),
                common_interests: pair.common_interests.clone(),
                mode: pair.mode,
                send_offer: true,
                room_id: pair.id.clone(),
            },
        );
        if !delivered_enqueuer {
            let _ = self.pairs.dissolve(&pair.id);
            self.requeue_survivor(candidate);
            return EstablishOutcome::Aborted;
        }

        match self.pairs.mark_chatting(&pair.id) {
            Ok(()) => {
                self.presence
                    .set_state(&enqueuer.session_id, SessionState::Chatting);
                self.presence
                    .set_state(&candidate.session_id, SessionState::Chatting);
                EstablishOutcome::Established
            }
            Err(e) => {
                // A disconnect raced us into grace (or teardown); the
                // normal grace machinery owns the pair now.
                debug!(pair = %pair.id, code = e.error_code(), "Pair left matched state before chatting");
                EstablishOutcome::Established
            }
        }
    }

    /// Put a half-disconnected match's survivor back into the queue with
    /// its original wait time, and tell it so.
    fn requeue_survivor(&self, survivor: QueueEntry) {
        let live = self
            .presence
            .get_by_session(&survivor.session_id)
            .and_then(|s| s.conn_id)
            == Some(survivor.conn_id);
        if !live {
            return;
        }
        let conn_id = survivor.conn_id;
        self.presence
            .set_state(&survivor.session_id, SessionState::Queued);
        let position = self.queues.requeue(survivor);
        self.send_to(
            conn_id,
            ServerEvent::QueueStatus {
                position,
                estimated_wait: (position as u64) * 10,
                message: "Your match dropped, looking for a new partner...".to_string(),
            },
        );
    }

    /// Open a grace window for a pair whose member just disconnected and
    /// arm the expiry timer. The retained member is deliberately not
    /// notified yet.
    pub fn begin_grace(self: &Arc<Self>, pair_id: &str, absent_session: &str) {
        let grace = self.config.timing.grace_period();
        let deadline = tokio::time::Instant::now() + grace;
        match self.pairs.begin_grace(pair_id, absent_session, deadline) {
            Ok(_) => {
                self.presence
                    .set_state(absent_session, SessionState::InGrace);
                let core = Arc::clone(self);
                let task_pair_id = pair_id.to_string();
                let absent = absent_session.to_string();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    core.on_grace_expired(&task_pair_id, &absent).await;
                })
                .abort_handle();
                self.pairs.arm_grace_timer(pair_id, timer);
            }
            Err(e) => {
                debug!(pair = %pair_id, code = e.error_code(), "Grace refused");
            }
        }
    }

    /// Grace timer callback. A restore that won the race makes this a
    /// no-op; otherwise the pair dissolves and only the retained member
    /// hears about it.
    async fn on_grace_expired(self: &Arc<Self>, pair_id: &str, absent_session: &str) {
        let Some(pair) = self.pairs.take_if_grace_expired(pair_id, absent_session) else {
            return;
        };

        self.presence.remove_session(absent_session);
        self.moderator.forget(absent_session);

        if let Some(partner) = pair.partner_of(absent_session) {
            self.presence
                .set_state(&partner.session_id, SessionState::Idle);
            self.send_to(
                partner.conn_id,
                ServerEvent::PartnerDisconnected {
                    reason: DisconnectReason::Timeout,
                    message: DisconnectReason::Timeout.notice().to_string(),
                },
            );
        }

        self.schedule_room_expiry(&pair.id).await;
    }

    /// Dissolve a pair on a member's initiative (leave, skip, kick). The
    /// other member is notified immediately; callers decide whether the
    /// leaver's violation counter is forgiven (clean ends yes, kicks no).
    pub async fn dissolve_pair(
        self: &Arc<Self>,
        pair_id: &str,
        reason: DisconnectReason,
        leaver_session: &str,
    ) -> Result<(), PairError> {
        let pair = self.pairs.dissolve(pair_id)?;

        if let Some(partner) = pair.partner_of(leaver_session) {
            self.send_to(
                partner.conn_id,
                ServerEvent::PartnerDisconnected {
                    reason,
                    message: reason.notice().to_string(),
                },
            );
            self.release_member(&partner.session_id);
        }
        self.release_member(leaver_session);

        self.schedule_room_expiry(&pair.id).await;
        Ok(())
    }

    /// Dissolve with no notification to anyone. Used when the retained
    /// member of a grace pair also disconnects: there is no live
    /// counterpart left to tell.
    pub async fn dissolve_pair_silent(self: &Arc<Self>, pair_id: &str) {
        let Ok(pair) = self.pairs.dissolve(pair_id) else {
            return;
        };
        for member in &pair.members {
            self.release_member(&member.session_id);
        }
        self.schedule_room_expiry(&pair.id).await;
    }

    /// Return a session to idle, or drop it entirely when it has no live
    /// connection left.
    fn release_member(&self, session_id: &str) {
        match self.presence.get_by_session(session_id) {
            Some(session) if session.conn_id.is_some() => {
                self.presence.set_state(session_id, SessionState::Idle);
            }
            Some(_) => {
                self.presence.remove_session(session_id);
                self.moderator.forget(session_id);
            }
            None => {}
        }
    }
}
