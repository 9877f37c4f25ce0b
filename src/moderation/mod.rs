//! Content moderation pipeline.
//!
//! Two layers run before any chat message is stored or fanned out: a local
//! blocklist scan and, when enabled, a remote toxicity classifier. Every
//! block increments the sender's violation counter; the counter drives the
//! escalation ladder (silent block -> warning -> kick).
//!
//! Remote failures fail open by default: an unreachable classifier must
//! not silence the whole service. `block_on_fail` inverts that policy.

mod local;
mod remote;

pub use local::LocalFilter;
pub use remote::{ClassifierError, Label, RemoteClassifier};

use crate::config::ModerationConfig;
use dashmap::DashMap;
use drift_proto::ModerationAction;
use tracing::warn;

/// Which layer produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Local,
    Remote,
}

/// Outcome of a moderation check.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub allowed: bool,
    /// Which layer blocked, `None` when allowed.
    pub layer: Option<Layer>,
    pub categories: Vec<String>,
    /// Escalation step for this block (`None` action on a silent block).
    pub action: ModerationAction,
    /// The sender's violation count after this check.
    pub flag_count: u32,
}

impl Verdict {
    fn allowed(flag_count: u32) -> Self {
        Self {
            allowed: true,
            layer: None,
            categories: Vec::new(),
            action: ModerationAction::None,
            flag_count,
        }
    }

    /// Client-facing reason string for a block.
    pub fn reason(&self) -> &'static str {
        match self.layer {
            Some(Layer::Local) => "Message contains prohibited content",
            Some(Layer::Remote) => "Message flagged by content review",
            None => "Message allowed",
        }
    }
}

/// The moderation service: both layers plus per-session violation counters.
pub struct Moderator {
    local: LocalFilter,
    remote: Option<RemoteClassifier>,
    flags: DashMap<String, u32>,
    config: ModerationConfig,
}

impl Moderator {
    pub fn new(config: ModerationConfig) -> Self {
        let remote = match (config.remote_enabled, &config.remote_url) {
            (true, Some(url)) => Some(RemoteClassifier::new(url.clone(), config.timeout())),
            _ => None,
        };
        Self {
            local: LocalFilter::new(),
            remote,
            flags: DashMap::new(),
            config,
        }
    }

    /// Run both layers over a message. Called by the relay before any
    /// persistence or fan-out; no lock is held while layer 2 is in flight.
    pub async fn check(&self, content: &str, session_id: &str) -> Verdict {
        let local_hits = self.local.scan(content);
        if !local_hits.is_empty() {
            return self.blocked(session_id, Layer::Local, local_hits);
        }

        if let Some(remote) = &self.remote {
            match remote.classify(content).await {
                Ok(labels) => {
                    let flagged = RemoteClassifier::flagged(&labels, self.config.threshold);
                    if !flagged.is_empty() {
                        return self.blocked(session_id, Layer::Remote, flagged);
                    }
                }
                Err(e) => {
                    warn!(
                        session = %session_id,
                        error = %e,
                        block_on_fail = self.config.block_on_fail,
                        "Remote moderation unavailable"
                    );
                    if self.config.block_on_fail {
                        return self.blocked(
                            session_id,
                            Layer::Remote,
                            vec!["moderation-unavailable".to_string()],
                        );
                    }
                }
            }
        }

        Verdict::allowed(self.flag_count(session_id))
    }

    fn blocked(&self, session_id: &str, layer: Layer, categories: Vec<String>) -> Verdict {
        let flag_count = {
            let mut entry = self.flags.entry(session_id.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        let action = if flag_count >= self.config.kick_after {
            ModerationAction::Kick
        } else if flag_count >= self.config.warn_after {
            ModerationAction::Warning
        } else {
            ModerationAction::None
        };
        Verdict {
            allowed: false,
            layer: Some(layer),
            categories,
            action,
            flag_count,
        }
    }

    /// Current violation count for a session.
    pub fn flag_count(&self, session_id: &str) -> u32 {
        self.flags.get(session_id).map(|c| *c).unwrap_or(0)
    }

    /// Forgive a session: clean pair dissolution or accepted reconnect.
    pub fn reset_flags(&self, session_id: &str) {
        self.flags.remove(session_id);
    }

    /// Drop counter state for a destroyed session.
    pub fn forget(&self, session_id: &str) {
        self.flags.remove(session_id);
    }
}
