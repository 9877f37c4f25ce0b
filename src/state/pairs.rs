//! PairRegistry - active two-party sessions and their state machines.
//!
//! ```text
//!         ┌──────────────────────────── dissolved ◄────────────┐
//!         │                                                    │
//!      matched ── both deliveries ──► chatting ─────► grace ───┤
//!         │                               ▲                    │
//!         └───────────────────────────────┘ restore within window
//! ```
//!
//! Grace timers are owned by the pair as abortable handles; restoring a
//! pair aborts the timer outright. The expiry callback re-checks state
//! under the registry lock, so an abort that lands after the sleep has
//! elapsed is still harmless.

use super::presence::ConnId;
use crate::error::PairError;
use drift_proto::Mode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tokio::time::Instant as TokioInstant;
use tokio::task::AbortHandle;
use tracing::info;
use uuid::Uuid;

/// Lifecycle state of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Matched,
    Chatting,
    Grace,
    Dissolved,
}

/// One member of a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairMember {
    pub session_id: String,
    pub conn_id: ConnId,
}

/// Cross-lock view of a pair. `members[0]` is the initiator (the enqueuer
/// whose join triggered the match) and is the one told to send the first
/// WebRTC offer.
#[derive(Debug, Clone, PartialEq)]
pub struct PairSnapshot {
    pub id: String,
    pub members: [PairMember; 2],
    pub mode: Mode,
    pub common_interests: Vec<String>,
    pub state: PairState,
    /// Which member is absent, while in grace.
    pub absent: Option<String>,
}

impl PairSnapshot {
    /// The member that is not `session_id`.
    pub fn partner_of(&self, session_id: &str) -> Option<&PairMember> {
        self.members
            .iter()
            .find(|m| m.session_id != session_id)
            .filter(|_| self.members.iter().any(|m| m.session_id == session_id))
    }

    /// The member with this session id.
    #[allow(dead_code)] // Used by the restore path's tests
    pub fn member(&self, session_id: &str) -> Option<&PairMember> {
        self.members.iter().find(|m| m.session_id == session_id)
    }
}

struct GraceWindow {
    absent: String,
    deadline: TokioInstant,
    timer: Option<AbortHandle>,
}

struct Pair {
    id: String,
    members: [PairMember; 2],
    mode: Mode,
    common_interests: Vec<String>,
    state: PairState,
    created_at: Instant,
    grace: Option<GraceWindow>,
}

impl Pair {
    fn snapshot(&self) -> PairSnapshot {
        PairSnapshot {
            id: self.id.clone(),
            members: self.members.clone(),
            mode: self.mode,
            common_interests: self.common_interests.clone(),
            state: self.state,
            absent: self.grace.as_ref().map(|g| g.absent.clone()),
        }
    }
}

#[derive(Default)]
struct Inner {
    pairs: HashMap<String, Pair>,
    by_session: HashMap<String, String>,
}

/// Registry of live pairs. Pair ids double as room ids and are never
/// reused. Lock order: PairRegistry before Presence.
#[derive(Default)]
pub struct PairRegistry {
    inner: Mutex<Inner>,
}

impl PairRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pair in `matched` state. `initiator` is the enqueuer that
    /// caused the match. Fails if either session is already paired.
    pub fn create(
        &self,
        initiator: PairMember,
        candidate: PairMember,
        mode: Mode,
        common_interests: Vec<String>,
    ) -> Result<PairSnapshot, PairError> {
        let mut inner = self.inner.lock();
        for member in [&initiator, &candidate] {
            if inner.by_session.contains_key(&member.session_id) {
                return Err(PairError::AlreadyPaired(member.session_id.clone()));
            }
        }

        let id = Uuid::new_v4().to_string();
        inner
            .by_session
            .insert(initiator.session_id.clone(), id.clone());
        inner
            .by_session
            .insert(candidate.session_id.clone(), id.clone());

        info!(
            pair = %id,
            initiator = %initiator.session_id,
            candidate = %candidate.session_id,
            mode = %mode,
            "Pair created"
        );

        let pair = Pair {
            id: id.clone(),
            members: [initiator, candidate],
            mode,
            common_interests,
            state: PairState::Matched,
            created_at: Instant::now(),
            grace: None,
        };
        let snapshot = pair.snapshot();
        inner.pairs.insert(id, pair);
        Ok(snapshot)
    }

    /// Advance `matched` -> `chatting` once both match notifications landed.
    pub fn mark_chatting(&self, pair_id: &str) -> Result<(), PairError> {
        let mut inner = self.inner.lock();
        let pair = inner.pairs.get_mut(pair_id).ok_or(PairError::UnknownPair)?;
        if pair.state != PairState::Matched {
            return Err(PairError::NotRestorable);
        }
        pair.state = PairState::Chatting;
        info!(
            pair = %pair_id,
            members = ?[&pair.members[0].session_id, &pair.members[1].session_id],
            "Pair chatting"
        );
        Ok(())
    }

    /// The live pair a session belongs to.
    pub fn pair_for_session(&self, session_id: &str) -> Option<PairSnapshot> {
        let inner = self.inner.lock();
        let pair_id = inner.by_session.get(session_id)?;
        inner.pairs.get(pair_id).map(Pair::snapshot)
    }

    #[allow(dead_code)] // Lookup by room id, for read surfaces and tests
    pub fn get(&self, pair_id: &str) -> Option<PairSnapshot> {
        self.inner.lock().pairs.get(pair_id).map(Pair::snapshot)
    }

    /// O(1) membership test by connection id.
    pub fn is_member_of(&self, pair_id: &str, conn_id: ConnId) -> bool {
        self.inner
            .lock()
            .pairs
            .get(pair_id)
            .is_some_and(|p| p.members.iter().any(|m| m.conn_id == conn_id))
    }

    /// Open the grace window: record the absentee and the deadline. The
    /// caller arms the timer and registers it via [`Self::arm_grace_timer`].
    pub fn begin_grace(
        &self,
        pair_id: &str,
        absent_session: &str,
        deadline: TokioInstant,
    ) -> Result<PairSnapshot, PairError> {
        let mut inner = self.inner.lock();
        let pair = inner.pairs.get_mut(pair_id).ok_or(PairError::UnknownPair)?;
        if !matches!(pair.state, PairState::Matched | PairState::Chatting) {
            return Err(PairError::NotRestorable);
        }
        if pair.members.iter().all(|m| m.session_id != absent_session) {
            return Err(PairError::NotAMember);
        }
        pair.state = PairState::Grace;
        pair.grace = Some(GraceWindow {
            absent: absent_session.to_string(),
            deadline,
            timer: None,
        });
        info!(
            pair = %pair_id,
            absent = %absent_session,
            members = ?[&pair.members[0].session_id, &pair.members[1].session_id],
            "Pair entered grace"
        );
        Ok(pair.snapshot())
    }

    /// Attach the spawned expiry timer to an open grace window.
    pub fn arm_grace_timer(&self, pair_id: &str, timer: AbortHandle) {
        let mut inner = self.inner.lock();
        if let Some(grace) = inner
            .pairs
            .get_mut(pair_id)
            .filter(|p| p.state == PairState::Grace)
            .and_then(|p| p.grace.as_mut())
        {
            grace.timer = Some(timer);
        } else {
            // The window closed (restore or dissolve) before arming.
            timer.abort();
        }
    }

    /// Restore a pair from grace: only valid while in `grace` and only for
    /// the absent member. Cancels the timer and rewrites the member's
    /// connection id.
    pub fn restore(
        &self,
        pair_id: &str,
        session_id: &str,
        new_conn: ConnId,
    ) -> Result<PairSnapshot, PairError> {
        let mut inner = self.inner.lock();
        let pair = inner.pairs.get_mut(pair_id).ok_or(PairError::UnknownPair)?;
        if pair.state != PairState::Grace {
            return Err(PairError::NotRestorable);
        }
        let Some(grace) = pair.grace.take_if(|g| g.absent == session_id) else {
            return Err(PairError::NotRestorable);
        };
        if let Some(timer) = grace.timer {
            timer.abort();
        }

        let member = pair
            .members
            .iter_mut()
            .find(|m| m.session_id == session_id)
            .ok_or(PairError::NotAMember)?;
        member.conn_id = new_conn;
        pair.state = PairState::Chatting;
        info!(
            pair = %pair_id,
            restored = %session_id,
            members = ?[&pair.members[0].session_id, &pair.members[1].session_id],
            "Pair restored from grace"
        );
        Ok(pair.snapshot())
    }

    /// Remove the pair if its grace window for `absent_session` is still
    /// open. Called by the expiry timer; a restore that won the race makes
    /// this a no-op.
    pub fn take_if_grace_expired(
        &self,
        pair_id: &str,
        absent_session: &str,
    ) -> Option<PairSnapshot> {
        let mut inner = self.inner.lock();
        let expired = inner.pairs.get(pair_id).is_some_and(|p| {
            p.state == PairState::Grace
                && p.grace.as_ref().is_some_and(|g| {
                    g.absent == absent_session && g.deadline <= TokioInstant::now()
                })
        });
        if !expired {
            return None;
        }
        Some(Self::remove_locked(&mut inner, pair_id, "grace expiry"))
    }

    /// Dissolve a pair unconditionally (skip, voluntary leave, kick, or the
    /// retained member disconnecting during grace). Aborts any timer.
    pub fn dissolve(&self, pair_id: &str) -> Result<PairSnapshot, PairError> {
        let mut inner = self.inner.lock();
        if !inner.pairs.contains_key(pair_id) {
            return Err(PairError::UnknownPair);
        }
        Ok(Self::remove_locked(&mut inner, pair_id, "dissolve"))
    }

    fn remove_locked(inner: &mut Inner, pair_id: &str, cause: &str) -> PairSnapshot {
        let mut pair = inner
            .pairs
            .remove(pair_id)
            .expect("caller checked existence");
        if let Some(timer) = pair.grace.as_mut().and_then(|g| g.timer.take()) {
            timer.abort();
        }
        for member in &pair.members {
            inner.by_session.remove(&member.session_id);
        }
        pair.state = PairState::Dissolved;
        info!(
            pair = %pair_id,
            members = ?[&pair.members[0].session_id, &pair.members[1].session_id],
            lived_ms = pair.created_at.elapsed().as_millis() as u64,
            cause,
            "Pair dissolved"
        );
        pair.snapshot()
    }

    /// Number of live pairs.
    pub fn count(&self) -> usize {
        self.inner.lock().pairs.len()
    }
}
