//! Books API library.
//!
//! A small HTTP service over a single `books` table: list every book, or add
//! one after field validation, behind per-client rate limits.

pub mod books;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod store;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
