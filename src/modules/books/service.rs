use std::sync::Arc;

use super::error::BookError;
use super::models::{Book, BookId, CreateBook, UpdateBook};
use super::repository::BookStore;
use super::validation;

/// Book operations exposed to the transport layer. Identifiers arrive as raw
/// strings and are parsed here.
pub struct BookService {
    store: Arc<dyn BookStore>,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn read_by_id(&self, id: &str) -> Result<Book, BookError> {
        let id = BookId::parse(id)?;
        self.store.find_by_id(&id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn read_all(&self) -> Result<Vec<Book>, BookError> {
        let books = self.store.find_all().await?;
        tracing::debug!(count = books.len(), "listed books");
        Ok(books)
    }

    /// Validate and persist a new book. Nothing is written when validation fails.
    #[tracing::instrument(skip(self, request), fields(title = %request.title, pages = request.pages))]
    pub async fn create(&self, request: CreateBook) -> Result<Book, BookError> {
        let mut book = Book::from(request);
        validation::validate_new(&book, self.store.as_ref()).await?;

        let id = self.store.insert(&book).await?;
        book.id = Some(id);

        tracing::info!(book_id = %id, "book created");
        Ok(book)
    }

    /// Merge `patch` onto the stored book and write it back with a fresh
    /// `updated_at`. The merged record is not re-validated.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: UpdateBook) -> Result<Book, BookError> {
        let mut book = self.read_by_id(id).await?;

        let changed = patch.apply_to(&mut book);
        book.touch();
        self.store.update(&book).await?;

        tracing::info!(changed, "book updated");
        Ok(book)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), BookError> {
        let book = self.read_by_id(id).await?;
        self.store.delete(&book).await?;

        tracing::info!("book deleted");
        Ok(())
    }
}
