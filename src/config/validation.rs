//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::{AppConfig, LimitRule};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Check a configuration for values the service cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be greater than 0"));
    }

    check_limit("rate_limit.global", &config.rate_limit.global, &mut errors);
    check_limit("rate_limit.write", &config.rate_limit.write, &mut errors);

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if config.database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be greater than 0"));
    }

    if HeaderValue::from_str(&config.cors.production_origin).is_err()
        || config.cors.production_origin.is_empty()
    {
        errors.push(ValidationError::new(
            "cors.production_origin",
            "must be a non-empty, valid header value",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_limit(prefix: &str, rule: &LimitRule, errors: &mut Vec<ValidationError>) {
    if rule.max == 0 {
        errors.push(ValidationError::new(format!("{prefix}.max"), "must be greater than 0"));
    }
    if rule.window_secs == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.window_secs"),
            "must be greater than 0",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = AppConfig::default();
        config.listener.port = 0;
        config.rate_limit.write.max = 0;
        config.rate_limit.global.window_secs = 0;
        config.cors.production_origin = "bad\norigin".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.port",
                "rate_limit.global.window_secs",
                "rate_limit.write.max",
                "cors.production_origin",
            ]
        );
    }
}
