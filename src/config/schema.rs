//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Origin allowed by CORS when running in production.
pub const DEFAULT_PRODUCTION_ORIGIN: &str = "https://first-node-nikoapi.herokuapp.com";

/// Root configuration for the books service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Deployment environment; drives CORS origin and log format.
    pub environment: Environment,

    /// CORS settings.
    pub cors: CorsConfig,

    /// Database connection and pool settings.
    pub database: DatabaseConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Security hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Origin CORS should allow, or `None` for the wildcard.
    pub fn allowed_origin(&self) -> Option<&str> {
        match self.environment {
            Environment::Production => Some(self.cors.production_origin.as_str()),
            Environment::Development => None,
        }
    }

    /// `host:port` the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listener.host, self.listener.port)
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port; `PORT` in the environment takes precedence.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// The single origin allowed in production.
    pub production_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            production_origin: DEFAULT_PRODUCTION_ORIGIN.to_string(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL. When set, the individual fields are ignored.
    pub url: Option<String>,

    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,

    /// Database name.
    pub name: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// How long a query waits for a pooled connection, in seconds.
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "api_user".to_string(),
            password: "password".to_string(),
            name: "books_api".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

/// A single fixed-window quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimitRule {
    /// Requests allowed per window.
    pub max: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Quota applied to every request.
    pub global: LimitRule,

    /// Additional quota applied to `POST /books`.
    pub write: LimitRule,

    /// Key clients by the first `X-Forwarded-For` entry instead of the peer address.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global: LimitRule { max: 5, window_secs: 60 },
            write: LimitRule { max: 1, window_secs: 60 },
            trust_proxy: false,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 100 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
