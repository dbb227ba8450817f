//! Book entities.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A validated book ready to be inserted. Both fields are already trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub author: String,
    pub title: String,
}

/// A row of the `books` table, serialized exactly as the database returned it.
///
/// No column is required, so rows with null or missing `author`/`title`
/// (or any other schema drift) still list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookRecord(Map<String, Value>);

impl BookRecord {
    pub fn author(&self) -> Option<&str> {
        self.0.get("author").and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    /// All columns of the row.
    pub fn columns(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<NewBook> for BookRecord {
    fn from(book: NewBook) -> Self {
        let mut row = Map::new();
        row.insert("author".into(), Value::String(book.author));
        row.insert("title".into(), Value::String(book.title));
        Self(row)
    }
}

/// Response body for a successful insert.
#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    pub status: String,
    pub message: String,
}

impl Status {
    pub fn book_added() -> Self {
        Self {
            status: "success".to_string(),
            message: "Book added.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_extra_columns() {
        let raw = serde_json::json!({"id": 7, "author": "Jane Austen", "title": "Persuasion"});
        let record: BookRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.author(), Some("Jane Austen"));
        assert_eq!(record.columns().get("id"), Some(&Value::from(7)));
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn test_record_with_null_or_missing_columns() {
        let raw = serde_json::json!({"id": 1, "author": null, "title": "Untitled"});
        let record: BookRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.author(), None);
        assert_eq!(record.title(), Some("Untitled"));
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);

        let raw = serde_json::json!({"id": 2});
        let record: BookRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.title(), None);
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }
}
