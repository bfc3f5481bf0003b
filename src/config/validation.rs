//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, TTL > 0, addresses parse)
//! - Check secrets decode to 32 bytes when supplied
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{EdgeConfig, RouteBudget};

/// A single semantic problem in the configuration.
#[derive(Debug)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn error(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate the full configuration, collecting every problem found.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(error(
            "listener.bind_address",
            "must be a valid socket address",
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(error("listener.request_timeout_secs", "must be nonzero"));
    }

    if config.token.default_ttl_secs == 0 {
        errors.push(error("token.default_ttl_secs", "must be nonzero"));
    }
    check_secret(&mut errors, "token.signing_secret", &config.token.signing_secret);
    check_secret(&mut errors, "cipher.root_secret", &config.cipher.root_secret);

    check_budget(&mut errors, "rate_limit.token", &config.rate_limit.token);
    check_budget(&mut errors, "rate_limit.stream", &config.rate_limit.stream);
    check_budget(&mut errors, "rate_limit.default", &config.rate_limit.default);

    if config.abuse.velocity_window_secs == 0 {
        errors.push(error("abuse.velocity_window_secs", "must be nonzero"));
    }
    if config.abuse.origin_window_secs == 0 {
        errors.push(error("abuse.origin_window_secs", "must be nonzero"));
    }
    if config.abuse.replay_window_secs == 0 {
        errors.push(error("abuse.replay_window_secs", "must be nonzero"));
    }
    if config.abuse.history_capacity == 0 {
        errors.push(error("abuse.history_capacity", "must be nonzero"));
    }
    if config.abuse.origin_limit < 2 {
        errors.push(error(
            "abuse.origin_limit",
            "must be at least 2 (a single origin is never concurrent)",
        ));
    }

    for (index, entry) in config.api_keys.iter().enumerate() {
        if entry.name.is_empty() {
            errors.push(error(&format!("api_keys[{index}].name"), "must not be empty"));
        }
        if entry.key.is_empty() {
            errors.push(error(&format!("api_keys[{index}].key"), "must not be empty"));
        }
    }

    if config.events.buffer_size == 0 {
        errors.push(error("events.buffer_size", "must be nonzero"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(error(
            "observability.metrics_address",
            "must be a valid socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_secret(errors: &mut Vec<ValidationError>, field: &str, secret: &Option<String>) {
    if let Some(value) = secret {
        let decoded = hex::decode(value);
        if !matches!(decoded, Ok(ref bytes) if bytes.len() == 32) {
            errors.push(error(field, "must be 64 hex characters (32 bytes)"));
        }
    }
}

fn check_budget(errors: &mut Vec<ValidationError>, field: &str, budget: &RouteBudget) {
    if budget.limit == 0 {
        errors.push(error(&format!("{field}.limit"), "must be nonzero"));
    }
    if budget.window_seconds == 0 {
        errors.push(error(&format!("{field}.window_seconds"), "must be nonzero"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(validate_config(&EdgeConfig::default()).is_ok());
    }

    #[test]
    fn test_bad_secret_rejected() {
        let mut config = EdgeConfig::default();
        config.token.signing_secret = Some("short".to_string());

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "token.signing_secret"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = EdgeConfig::default();
        config.token.default_ttl_secs = 0;
        config.rate_limit.stream.window_seconds = 0;
        config.events.buffer_size = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let mut config = EdgeConfig::default();
        config.api_keys.push(crate::config::ApiKeyConfig {
            name: String::new(),
            key: "k".to_string(),
            scopes: vec![],
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "api_keys[0].name"));
    }
}
