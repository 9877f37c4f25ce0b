//! Core config struct definitions.

use super::defaults::*;
use serde::Deserialize;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Top-level configuration, loaded from TOML.
///
/// Every field has a serde default so a missing file (or an empty table)
/// yields a fully usable configuration; tests construct these in code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub matchmaking: MatchmakingConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Server identity and listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Server name, used in log output.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// WebSocket listen address.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Liveness and lifecycle timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Window for pair restoration after a member disconnects (default 30 s).
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Heartbeat cadence (default 15 s).
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// How long clients are told to wait for a pong. Informational only.
    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,
    /// Missed-ping budget before the connection is evicted (default 2).
    #[serde(default = "default_max_missed_pings")]
    pub max_missed_pings: u32,
    /// Cadence of the queue sweep that discards stale entries (default 30 s).
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

/// Matchmaking tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchmakingConfig {
    /// Waiters older than this get a +3 score bonus (default 30 s).
    #[serde(default = "default_starvation_bonus_ms")]
    pub starvation_bonus_ms: u64,
}

/// Content moderation pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModerationConfig {
    /// Whether the remote (layer 2) classifier is consulted at all.
    #[serde(default)]
    pub remote_enabled: bool,
    /// Endpoint of the remote toxicity classifier.
    #[serde(default)]
    pub remote_url: Option<String>,
    /// Minimum classifier score that flags a message (default 0.5).
    #[serde(default = "default_moderation_threshold")]
    pub threshold: f32,
    /// Hard timeout for a remote classification call (default 8 s).
    #[serde(default = "default_moderation_timeout_ms")]
    pub timeout_ms: u64,
    /// If true, a remote failure blocks the message instead of failing open.
    #[serde(default)]
    pub block_on_fail: bool,
    /// Violation count at which blocks start carrying a warning (default 2).
    #[serde(default = "default_warn_after")]
    pub warn_after: u32,
    /// Violation count at which the sender is kicked (default 5).
    #[serde(default = "default_kick_after")]
    pub kick_after: u32,
}

/// Relay and channel limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum chat message length in characters (default 1000).
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    /// Per-connection outbound channel capacity. A full channel marks the
    /// connection unhealthy and closes it (default 64).
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// TTL scheduled on a room's messages when its pair ends (default 12 h).
    #[serde(default = "default_message_expiry_hours")]
    pub message_expiry_hours: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            listen: default_listen(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            pong_timeout_ms: default_pong_timeout_ms(),
            max_missed_pings: default_max_missed_pings(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            starvation_bonus_ms: default_starvation_bonus_ms(),
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            remote_enabled: false,
            remote_url: None,
            threshold: default_moderation_threshold(),
            timeout_ms: default_moderation_timeout_ms(),
            block_on_fail: false,
            warn_after: default_warn_after(),
            kick_after: default_kick_after(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_len: default_max_message_len(),
            outbound_capacity: default_outbound_capacity(),
            message_expiry_hours: default_message_expiry_hours(),
        }
    }
}

impl TimingConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl MatchmakingConfig {
    pub fn starvation_bonus(&self) -> Duration {
        Duration::from_millis(self.starvation_bonus_ms)
    }
}

impl ModerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
