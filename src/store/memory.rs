//! In-process store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::books::model::{BookRecord, NewBook};
use crate::store::{BookStore, StoreError};

/// A `Vec`-backed store. Cloning shares the same rows.
#[derive(Clone, Default)]
pub struct MemoryBookStore {
    rows: Arc<RwLock<Vec<BookRecord>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store set to fail".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn list_books(&self) -> Result<Vec<BookRecord>, StoreError> {
        self.check_available()?;
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        Ok(rows.clone())
    }

    async fn insert_book(&self, book: &NewBook) -> Result<(), StoreError> {
        self.check_available()?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        rows.push(book.clone().into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(author: &str, title: &str) -> NewBook {
        NewBook {
            author: author.into(),
            title: title.into(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_list() {
        let store = MemoryBookStore::new();
        assert!(store.list_books().await.unwrap().is_empty());

        store.insert_book(&book("Jane Austen", "Persuasion")).await.unwrap();
        store.insert_book(&book("George Eliot", "Middlemarch")).await.unwrap();

        let rows = store.list_books().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].author(), Some("Jane Austen"));
        assert_eq!(rows[1].title(), Some("Middlemarch"));
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let store = MemoryBookStore::new();
        store.set_failing(true);

        assert!(matches!(store.list_books().await, Err(StoreError::Unavailable(_))));
        assert!(store.insert_book(&book("Jane Austen", "Persuasion")).await.is_err());
        assert!(store.is_empty());

        store.set_failing(false);
        assert!(store.list_books().await.is_ok());
    }
}
