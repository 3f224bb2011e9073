use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use bookstore_db::Store;
use bookstore_kernel::{IndexSpec, Migration};

use super::{persisted_id, BookStore};
use crate::modules::books::error::BookError;
use crate::modules::books::models::{Book, BookId};

/// Collection holding one document per book.
pub const COLLECTION: &str = "books";

const DUPLICATE_KEY: i32 = 11000;

/// Index backing the `(title, pages)` uniqueness rule. Closes the window between
/// the validation read and the insert.
pub fn unique_title_pages() -> Migration {
    Migration {
        id: "001_books_title_pages_unique",
        collection: COLLECTION,
        index: IndexSpec {
            name: "books_title_pages_unique",
            fields: &["title", "pages"],
            unique: true,
        },
    }
}

/// Stored shape of a book. Field names match what earlier deployments wrote.
#[derive(Debug, Serialize, Deserialize)]
struct BookDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    title: String,
    pages: i64,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

impl BookDocument {
    fn new(id: BookId, book: &Book) -> Self {
        Self {
            id: id.object_id(),
            title: book.title.clone(),
            pages: book.pages,
            created_at: to_bson(book.created_at),
            updated_at: to_bson(book.updated_at),
        }
    }
}

impl TryFrom<BookDocument> for Book {
    type Error = BookError;

    fn try_from(doc: BookDocument) -> Result<Self, Self::Error> {
        Ok(Book {
            id: Some(doc.id.into()),
            created_at: from_bson(doc.id, "created_at", doc.created_at)?,
            updated_at: from_bson(doc.id, "updated_at", doc.updated_at)?,
            title: doc.title,
            pages: doc.pages,
        })
    }
}

fn to_bson(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

fn from_bson(id: ObjectId, field: &str, at: bson::DateTime) -> Result<DateTime<Utc>, BookError> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).ok_or_else(|| {
        BookError::Unclassified(anyhow::anyhow!(
            "book {} has an out-of-range {} ({} ms)",
            id.to_hex(),
            field,
            at.timestamp_millis()
        ))
    })
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

fn write_error(book: &Book, err: MongoError) -> BookError {
    if is_duplicate_key(&err) {
        BookError::duplicate(&book.title, book.pages)
    } else {
        BookError::storage(err)
    }
}

/// Book store backed by the `books` collection.
#[derive(Clone)]
pub struct MongoBookStore {
    collection: Collection<BookDocument>,
}

impl MongoBookStore {
    pub fn new(store: &Store) -> Self {
        Self {
            collection: store.collection(COLLECTION),
        }
    }
}

#[async_trait]
impl BookStore for MongoBookStore {
    async fn insert(&self, book: &Book) -> Result<BookId, BookError> {
        let id = BookId::generate();

        self.collection
            .insert_one(BookDocument::new(id, book))
            .await
            .map_err(|err| write_error(book, err))?;

        Ok(id)
    }

    async fn find_by_id(&self, id: &BookId) -> Result<Book, BookError> {
        self.collection
            .find_one(doc! { "_id": id.object_id() })
            .await
            .map_err(BookError::storage)?
            .ok_or_else(|| BookError::NotFound(id.to_string()))?
            .try_into()
    }

    async fn find_all(&self) -> Result<Vec<Book>, BookError> {
        let documents: Vec<BookDocument> = self
            .collection
            .find(doc! {})
            .await
            .map_err(BookError::storage)?
            .try_collect()
            .await
            .map_err(BookError::storage)?;

        documents.into_iter().map(Book::try_from).collect()
    }

    async fn update(&self, book: &Book) -> Result<(), BookError> {
        let id = persisted_id(book)?;

        let result = self
            .collection
            .replace_one(doc! { "_id": id.object_id() }, BookDocument::new(id, book))
            .await
            .map_err(|err| write_error(book, err))?;

        if result.matched_count == 0 {
            return Err(BookError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, book: &Book) -> Result<(), BookError> {
        let id = persisted_id(book)?;

        let result = self
            .collection
            .delete_one(doc! { "_id": id.object_id() })
            .await
            .map_err(BookError::storage)?;

        if result.deleted_count == 0 {
            return Err(BookError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn count(&self, title: &str, pages: i64) -> Result<u64, BookError> {
        self.collection
            .count_documents(doc! { "title": title, "pages": pages })
            .await
            .map_err(BookError::storage)
    }
}
