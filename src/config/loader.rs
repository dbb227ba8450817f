//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{AppConfig, Environment};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// An environment variable that was set but could not be applied.
///
/// Collected rather than logged, since the subscriber is installed only after
/// the configuration is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvWarning {
    pub var: &'static str,
    pub value: String,
    pub error: String,
}

impl EnvWarning {
    /// Emit the warning through `tracing`.
    pub fn log(&self) {
        tracing::warn!(
            var = self.var,
            value = %self.value,
            error = %self.error,
            "Ignoring unparsable environment variable"
        );
    }
}

fn parse_port(var: &'static str, value: String, warnings: &mut Vec<EnvWarning>) -> Option<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) => Some(port),
        Err(e) => {
            warnings.push(EnvWarning {
                var,
                value,
                error: e.to_string(),
            });
            None
        }
    }
}

/// Overlay environment variables onto `config`.
///
/// `lookup` is usually `std::env::var(..).ok()`; tests pass a closure over a map.
/// Unparsable values leave the current setting in place and are returned.
pub fn apply_env<F>(config: &mut AppConfig, lookup: F) -> Vec<EnvWarning>
where
    F: Fn(&str) -> Option<String>,
{
    let mut warnings = Vec::new();

    if let Some(env) = lookup("APP_ENV") {
        config.environment = if env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        };
    }

    if let Some(port) = lookup("PORT").and_then(|v| parse_port("PORT", v, &mut warnings)) {
        config.listener.port = port;
    }

    let db = &mut config.database;
    if let Some(url) = lookup("DATABASE_URL") {
        db.url = Some(url);
    }
    if let Some(host) = lookup("DB_HOST") {
        db.host = host;
    }
    if let Some(port) = lookup("DB_PORT").and_then(|v| parse_port("DB_PORT", v, &mut warnings)) {
        db.port = port;
    }
    if let Some(user) = lookup("DB_USER") {
        db.user = user;
    }
    if let Some(password) = lookup("DB_PASSWORD") {
        db.password = password;
    }
    if let Some(name) = lookup("DB_DATABASE") {
        db.name = name;
    }

    warnings
}

/// Build the runtime configuration: optional file, then environment, then validation.
///
/// Environment warnings are handed back for the caller to log once logging is up.
pub fn resolve_config(path: Option<&Path>) -> Result<(AppConfig, Vec<EnvWarning>), ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    let warnings = apply_env(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok((config, warnings))
}
