//! In-process book store for tests.
//!
//! Behaves like the collection with its unique `(title, pages)` index applied, and
//! can be switched into failure modes to exercise error paths.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{persisted_id, BookStore};
use crate::modules::books::error::BookError;
use crate::modules::books::models::{Book, BookId};

#[derive(Default)]
struct State {
    books: Vec<Book>,
    unavailable: bool,
    failing_counts: bool,
}

#[derive(Default)]
pub struct InMemoryBookStore {
    state: Mutex<State>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation fails with [`BookError::StorageUnavailable`] while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Only [`BookStore::count`] fails while set.
    pub fn fail_counts(&self, failing: bool) {
        self.lock().failing_counts = failing;
    }

    pub fn len(&self) -> usize {
        self.lock().books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn available(&self) -> Result<MutexGuard<'_, State>, BookError> {
        let state = self.lock();
        if state.unavailable {
            return Err(BookError::storage(anyhow::anyhow!(
                "in-memory store is unavailable"
            )));
        }
        Ok(state)
    }
}

impl State {
    fn position(&self, id: &BookId) -> Option<usize> {
        self.books.iter().position(|b| b.id.as_ref() == Some(id))
    }

    fn conflicts(&self, book: &Book) -> bool {
        self.books
            .iter()
            .any(|b| b.id != book.id && b.title == book.title && b.pages == book.pages)
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn insert(&self, book: &Book) -> Result<BookId, BookError> {
        let mut state = self.available()?;

        let id = BookId::generate();
        let mut stored = book.clone();
        stored.id = Some(id);
        if state.conflicts(&stored) {
            return Err(BookError::duplicate(&book.title, book.pages));
        }

        state.books.push(stored);
        Ok(id)
    }

    async fn find_by_id(&self, id: &BookId) -> Result<Book, BookError> {
        let state = self.available()?;
        state
            .position(id)
            .map(|index| state.books[index].clone())
            .ok_or_else(|| BookError::NotFound(id.to_string()))
    }

    async fn find_all(&self) -> Result<Vec<Book>, BookError> {
        Ok(self.available()?.books.clone())
    }

    async fn update(&self, book: &Book) -> Result<(), BookError> {
        let id = persisted_id(book)?;
        let mut state = self.available()?;

        let index = state
            .position(&id)
            .ok_or_else(|| BookError::NotFound(id.to_string()))?;
        if state.conflicts(book) {
            return Err(BookError::duplicate(&book.title, book.pages));
        }

        state.books[index] = book.clone();
        Ok(())
    }

    async fn delete(&self, book: &Book) -> Result<(), BookError> {
        let id = persisted_id(book)?;
        let mut state = self.available()?;

        let index = state
            .position(&id)
            .ok_or_else(|| BookError::NotFound(id.to_string()))?;
        state.books.remove(index);
        Ok(())
    }

    async fn count(&self, title: &str, pages: i64) -> Result<u64, BookError> {
        let state = self.available()?;
        if state.failing_counts {
            return Err(BookError::storage(anyhow::anyhow!("count timed out")));
        }

        let count = state
            .books
            .iter()
            .filter(|b| b.title == title && b.pages == pages)
            .count();
        Ok(count as u64)
    }
}
