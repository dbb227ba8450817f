//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file
//!     → loader.rs (parse & deserialize)
//!     → loader.rs apply_env (APP_ENV, PORT, DATABASE_URL, DB_*)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env, load_config, resolve_config, ConfigError, EnvWarning};
pub use schema::{
    AppConfig, CorsConfig, DatabaseConfig, Environment, LimitRule, ListenerConfig,
    ObservabilityConfig, RateLimitConfig, SecurityConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
