//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_server_name() -> String {
    "drift".to_string()
}

pub fn default_listen() -> String {
    "127.0.0.1:8920".to_string()
}

// =============================================================================
// Timing Defaults
// =============================================================================

pub fn default_grace_period_ms() -> u64 {
    30_000
}

pub fn default_ping_interval_ms() -> u64 {
    15_000
}

pub fn default_pong_timeout_ms() -> u64 {
    5_000
}

pub fn default_max_missed_pings() -> u32 {
    2
}

pub fn default_sweep_interval_ms() -> u64 {
    30_000
}

// =============================================================================
// Matchmaking Defaults
// =============================================================================

pub fn default_starvation_bonus_ms() -> u64 {
    30_000
}

// =============================================================================
// Moderation Defaults
// =============================================================================

pub fn default_moderation_threshold() -> f32 {
    0.5
}

pub fn default_moderation_timeout_ms() -> u64 {
    8_000
}

pub fn default_warn_after() -> u32 {
    2
}

pub fn default_kick_after() -> u32 {
    5
}

// =============================================================================
// Limits Defaults
// =============================================================================

pub fn default_max_message_len() -> usize {
    drift_proto::MAX_MESSAGE_LEN
}

pub fn default_outbound_capacity() -> usize {
    64
}

pub fn default_message_expiry_hours() -> u64 {
    12
}
