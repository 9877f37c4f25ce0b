//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config and its sections)
//! - [`defaults`]: Serde default value functions
//! - [`validation`]: Pre-start consistency checks

mod defaults;
mod types;
mod validation;

pub use types::{
    Config, LimitsConfig, LogFormat, MatchmakingConfig, ModerationConfig, ServerConfig,
    TimingConfig,
};
pub use validation::validate;

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the built-in defaults; a present but malformed
    /// file is an error.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let config = toml::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("failed to parse {path}: {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path, "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read {path}: {e}")),
        }
    }
}
