//! Persistence gateway for books.

use async_trait::async_trait;

use super::error::BookError;
use super::models::{Book, BookId};

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod mongo;

pub use mongo::MongoBookStore;

/// Storage operations the book service relies on.
///
/// Every method is one round-trip to the store. Transport and write failures are
/// reported as [`BookError::StorageUnavailable`] and never retried.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Persist a new book and return the identifier it was stored under. A write
    /// rejected by the store's uniqueness constraint is a duplicate
    /// [`BookError::ValidationFailed`].
    async fn insert(&self, book: &Book) -> Result<BookId, BookError>;

    /// [`BookError::NotFound`] when no book has this identifier.
    async fn find_by_id(&self, id: &BookId) -> Result<Book, BookError>;

    /// Every stored book; an empty store yields an empty vector.
    async fn find_all(&self) -> Result<Vec<Book>, BookError>;

    /// Overwrite a previously loaded book.
    async fn update(&self, book: &Book) -> Result<(), BookError>;

    /// Remove a previously loaded book.
    async fn delete(&self, book: &Book) -> Result<(), BookError>;

    /// Number of stored books with exactly this title and page count.
    async fn count(&self, title: &str, pages: i64) -> Result<u64, BookError>;
}

/// Identifier of a book that must already be persisted.
pub(crate) fn persisted_id(book: &Book) -> Result<BookId, BookError> {
    book.id
        .ok_or_else(|| BookError::Unclassified(anyhow::anyhow!("book has not been persisted yet")))
}
