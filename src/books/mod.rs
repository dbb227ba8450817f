//! The books resource: entities, field rules and handlers.

pub mod handlers;
pub mod model;
pub mod validation;

pub use model::{BookRecord, NewBook, Status};
pub use validation::{validate_book, FieldError, FieldRule, Rule, BOOK_RULES};
