//! Data access for the `books` table.
//!
//! # Data Flow
//! ```text
//! handlers
//!     → BookStore (trait object in AppState)
//!         → postgres.rs (pooled sqlx connections)
//!         → memory.rs   (in-process, tests and local runs)
//! ```
//!
//! # Design Decisions
//! - Two fixed statements, no query builder
//! - No retries and no explicit transactions; each insert is one statement
//! - Errors propagate to the HTTP layer, which logs them and answers 500

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::books::model::{BookRecord, NewBook};

pub use memory::MemoryBookStore;
pub use postgres::PgBookStore;

/// Error type for data access.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("row decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence operations the HTTP layer needs.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Every row of the table, in storage order.
    async fn list_books(&self) -> Result<Vec<BookRecord>, StoreError>;

    /// Insert one row.
    async fn insert_book(&self, book: &NewBook) -> Result<(), StoreError>;
}
