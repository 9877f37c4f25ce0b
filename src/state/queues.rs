//! MatchQueues - per-mode waiting queues and best-match selection.
//!
//! Scoring is deterministic: `10 x |common interests| + 3` if the candidate
//! has waited past the starvation bonus window. Any waiting candidate is
//! matchable (score only ranks); ties go to the longest-waiting entry, so
//! interest-rich newcomers cannot indefinitely preempt the oldest waiter.

use super::presence::ConnId;
use drift_proto::{common_interests, Mode};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// A session waiting for a partner.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub session_id: String,
    pub conn_id: ConnId,
    pub interests: Vec<String>,
    pub mode: Mode,
    pub queued_at: Instant,
}

impl QueueEntry {
    pub fn new(session_id: String, conn_id: ConnId, interests: Vec<String>, mode: Mode) -> Self {
        Self {
            session_id,
            conn_id,
            interests,
            mode,
            queued_at: Instant::now(),
        }
    }
}

/// Result of an enqueue.
pub enum EnqueueOutcome {
    /// A partner was selected and removed from the queue.
    Matched { candidate: QueueEntry },
    /// No candidate; the entry now waits at this 1-based position.
    Queued { position: usize },
}

/// Read-only queue depth snapshot.
#[derive(Debug, Clone)]
pub struct QueueStats {
    pub text_waiting: usize,
    pub video_waiting: usize,
    /// Age of the oldest entry across both queues, in milliseconds.
    pub longest_wait_ms: u64,
}

#[derive(Default)]
struct Inner {
    text: Vec<QueueEntry>,
    video: Vec<QueueEntry>,
}

impl Inner {
    fn queue_mut(&mut self, mode: Mode) -> &mut Vec<QueueEntry> {
        match mode {
            Mode::Text => &mut self.text,
            Mode::Video => &mut self.video,
        }
    }
}

/// The two waiting queues, one per mode.
pub struct MatchQueues {
    inner: Mutex<Inner>,
    starvation_bonus: Duration,
}

/// Match score of candidate `b` for enqueuer `a` at time `now`.
pub fn score(a: &QueueEntry, b: &QueueEntry, now: Instant, starvation_bonus: Duration) -> u32 {
    let overlap = common_interests(&a.interests, &b.interests).len() as u32;
    let starving = now.duration_since(b.queued_at) > starvation_bonus;
    10 * overlap + if starving { 3 } else { 0 }
}

impl MatchQueues {
    pub fn new(starvation_bonus: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            starvation_bonus,
        }
    }

    /// Enqueue a session, matching it against the waiting entries of the
    /// same mode. At most one entry per session exists across both queues;
    /// re-enqueueing replaces the previous entry.
    pub fn enqueue(&self, entry: QueueEntry) -> EnqueueOutcome {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        inner.text.retain(|e| e.session_id != entry.session_id);
        inner.video.retain(|e| e.session_id != entry.session_id);

        let queue = inner.queue_mut(entry.mode);
        let mut best: Option<(usize, u32, Instant)> = None;
        for (idx, candidate) in queue.iter().enumerate() {
            if candidate.conn_id == entry.conn_id {
                continue;
            }
            let candidate_score = score(&entry, candidate, now, self.starvation_bonus);
            let better = match best {
                None => true,
                Some((_, best_score, best_queued_at)) => {
                    candidate_score > best_score
                        || (candidate_score == best_score && candidate.queued_at < best_queued_at)
                }
            };
            if better {
                best = Some((idx, candidate_score, candidate.queued_at));
            }
        }

        match best {
            Some((idx, _, _)) => {
                let candidate = queue.remove(idx);
                EnqueueOutcome::Matched { candidate }
            }
            None => {
                queue.push(entry);
                EnqueueOutcome::Queued {
                    position: queue.len(),
                }
            }
        }
    }

    /// Re-queue an entry without match selection, preserving its original
    /// `queued_at`. Used when a half-delivered match returns its survivor
    /// to the pool. Returns the 1-based position.
    pub fn requeue(&self, entry: QueueEntry) -> usize {
        let mut inner = self.inner.lock();
        inner.text.retain(|e| e.session_id != entry.session_id);
        inner.video.retain(|e| e.session_id != entry.session_id);
        let queue = inner.queue_mut(entry.mode);
        queue.push(entry);
        queue.len()
    }

    /// Drop any entry owned by this connection. No-op if absent.
    pub fn remove(&self, conn_id: ConnId) {
        let mut inner = self.inner.lock();
        inner.text.retain(|e| e.conn_id != conn_id);
        inner.video.retain(|e| e.conn_id != conn_id);
    }

    /// Discard entries whose connection is no longer live. Catches
    /// stragglers from races between matching and disconnect.
    pub fn sweep(&self, live: &HashSet<ConnId>) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.text.len() + inner.video.len();
        inner.text.retain(|e| live.contains(&e.conn_id));
        inner.video.retain(|e| live.contains(&e.conn_id));
        before - (inner.text.len() + inner.video.len())
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        let oldest = inner
            .text
            .iter()
            .chain(inner.video.iter())
            .map(|e| e.queued_at)
            .min();
        QueueStats {
            text_waiting: inner.text.len(),
            video_waiting: inner.video.len(),
            longest_wait_ms: oldest.map_or(0, |t| t.elapsed().as_millis() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const BONUS: Duration = Duration::from_secs(30);

    fn entry(session: &str, interests: &[&str]) -> QueueEntry {
        QueueEntry::new(
            session.to_string(),
            Uuid::new_v4(),
            drift_proto::normalize_interests(interests.iter().copied()),
            Mode::Text,
        )
    }

    fn queues() -> MatchQueues {
        MatchQueues::new(BONUS)
    }

    #[test]
    fn first_enqueue_waits() {
        let q = queues();
        match q.enqueue(entry("a", &["music"])) {
            EnqueueOutcome::Queued { position } => assert_eq!(position, 1),
            EnqueueOutcome::Matched { .. } => panic!("nothing to match against"),
        }
    }

    #[test]
    fn highest_interest_overlap_wins() {
        let q = queues();
        q.enqueue(entry("one-common", &["music"]));
        q.enqueue(entry("two-common", &["music", "gaming"]));

        match q.enqueue(entry("joiner", &["music", "gaming", "art"])) {
            EnqueueOutcome::Matched { candidate } => {
                assert_eq!(candidate.session_id, "two-common");
            }
            EnqueueOutcome::Queued { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn ties_go_to_the_longest_waiter() {
        let q = queues();
        let mut old = entry("old", &[]);
        old.queued_at = Instant::now() - Duration::from_secs(5);
        q.enqueue(old);
        q.enqueue(entry("young", &[]));

        match q.enqueue(entry("joiner", &[])) {
            EnqueueOutcome::Matched { candidate } => assert_eq!(candidate.session_id, "old"),
            EnqueueOutcome::Queued { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn starvation_bonus_outranks_freshness_not_interests() {
        let now = Instant::now();
        let joiner = entry("joiner", &["music"]);

        let mut starved = entry("starved", &[]);
        starved.queued_at = now - Duration::from_secs(31);
        let fresh_overlap = entry("fresh", &["music"]);

        // 0 common + starving = 3; 1 common + fresh = 10.
        assert_eq!(score(&joiner, &starved, now, BONUS), 3);
        assert_eq!(score(&joiner, &fresh_overlap, now, BONUS), 10);

        let q = queues();
        let mut starved = entry("starved", &[]);
        starved.queued_at = now - Duration::from_secs(31);
        q.enqueue(starved);
        q.enqueue(entry("fresh", &["music"]));
        match q.enqueue(entry("joiner", &["music"])) {
            EnqueueOutcome::Matched { candidate } => assert_eq!(candidate.session_id, "fresh"),
            EnqueueOutcome::Queued { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn re_enqueue_replaces_the_previous_entry() {
        let q = queues();
        let first = entry("a", &["music"]);
        let conn = first.conn_id;
        q.enqueue(first);

        // Same session joins again (same connection): must not self-match.
        let again = QueueEntry::new("a".to_string(), conn, vec![], Mode::Text);
        match q.enqueue(again) {
            EnqueueOutcome::Queued { position } => assert_eq!(position, 1),
            EnqueueOutcome::Matched { .. } => panic!("matched against itself"),
        }
        assert_eq!(q.stats().text_waiting, 1);
    }

    #[test]
    fn modes_do_not_cross_match() {
        let q = queues();
        q.enqueue(entry("text-waiter", &[]));

        let video = QueueEntry::new("v".to_string(), Uuid::new_v4(), vec![], Mode::Video);
        match q.enqueue(video) {
            EnqueueOutcome::Queued { position } => assert_eq!(position, 1),
            EnqueueOutcome::Matched { .. } => panic!("crossed modes"),
        }
    }

    #[test]
    fn sweep_discards_dead_connections() {
        let q = queues();
        let keep = entry("keep", &[]);
        let live: HashSet<ConnId> = [keep.conn_id].into();
        q.enqueue(keep);
        q.enqueue(entry("dead", &[]));

        assert_eq!(q.sweep(&live), 1);
        assert_eq!(q.stats().text_waiting, 1);
    }

    #[test]
    fn remove_is_a_noop_when_absent() {
        let q = queues();
        q.remove(Uuid::new_v4());
        assert_eq!(q.stats().text_waiting, 0);
    }
}
