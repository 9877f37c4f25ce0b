//! Configuration validation, run once before the server starts.

use super::Config;

/// Validate a loaded configuration.
///
/// Returns every problem found rather than stopping at the first, so an
/// operator can fix a config file in one pass.
pub fn validate(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.server.listen.parse::<std::net::SocketAddr>().is_err() {
        errors.push(format!(
            "[server].listen is not a valid socket address: {:?}",
            config.server.listen
        ));
    }

    if config.timing.ping_interval_ms == 0 {
        errors.push("[timing].ping_interval_ms must be greater than zero".to_string());
    }

    if config.timing.sweep_interval_ms == 0 {
        errors.push("[timing].sweep_interval_ms must be greater than zero".to_string());
    }

    if !(0.0..=1.0).contains(&config.moderation.threshold) {
        errors.push(format!(
            "[moderation].threshold must be within 0.0..=1.0, got {}",
            config.moderation.threshold
        ));
    }

    if config.moderation.warn_after >= config.moderation.kick_after {
        errors.push(format!(
            "[moderation].warn_after ({}) must be below kick_after ({})",
            config.moderation.warn_after, config.moderation.kick_after
        ));
    }

    if config.moderation.remote_enabled && config.moderation.remote_url.is_none() {
        errors.push("[moderation].remote_enabled requires remote_url".to_string());
    }

    if config.limits.max_message_len == 0 {
        errors.push("[limits].max_message_len must be greater than zero".to_string());
    }

    if config.limits.outbound_capacity == 0 {
        errors.push("[limits].outbound_capacity must be greater than zero".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn escalation_thresholds_must_be_ordered() {
        let mut config = Config::default();
        config.moderation.warn_after = 5;
        config.moderation.kick_after = 2;
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("warn_after")));
    }

    #[test]
    fn remote_moderation_requires_url() {
        let mut config = Config::default();
        config.moderation.remote_enabled = true;
        assert!(validate(&config).is_err());

        config.moderation.remote_url = Some("http://localhost:9000/classify".to_string());
        assert!(validate(&config).is_ok());
    }
}
