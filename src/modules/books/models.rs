use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::BookError;

/// Store-assigned identifier of a book, rendered as 24 hexadecimal characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookId(ObjectId);

impl BookId {
    /// Fresh identifier for a record about to be inserted.
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    /// Parse a client-supplied identifier, rejecting anything that is not a
    /// well-formed ObjectId.
    pub fn parse(raw: &str) -> Result<Self, BookError> {
        ObjectId::parse_str(raw)
            .map(Self)
            .map_err(|_| BookError::InvalidIdentifier(raw.to_string()))
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl From<ObjectId> for BookId {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl FromStr for BookId {
    type Err = BookError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl TryFrom<String> for BookId {
    type Error = BookError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<BookId> for String {
    fn from(id: BookId) -> Self {
        id.0.to_hex()
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

/// A book of the catalogue.
///
/// `id` stays empty until the record has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Book {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BookId>,
    #[validate(length(min = 1, code = "required", message = "title must not be empty"))]
    pub title: String,
    #[validate(range(min = 1, code = "min", message = "pages is required and must be at least 1"))]
    pub pages: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Unsaved book stamped with the current time.
    pub fn new(title: impl Into<String>, pages: i64) -> Self {
        let now = timestamp_now();
        Self {
            id: None,
            title: title.into(),
            pages,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh `updated_at` ahead of a write.
    pub fn touch(&mut self) {
        self.updated_at = timestamp_now();
    }
}

/// Request model for creating a new book.
///
/// Missing members deserialize to empty values so that validation, not the JSON
/// extractor, reports them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBook {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pages: i64,
}

impl From<CreateBook> for Book {
    fn from(request: CreateBook) -> Self {
        Book::new(request.title, request.pages)
    }
}

/// Partial update of a book.
///
/// An absent member leaves the stored value alone. So does an empty title or a
/// zero page count: clients relying on the original API send those to mean "no
/// change".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBook {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pages: Option<i64>,
}

impl UpdateBook {
    /// Merge the supplied members onto `book`. Returns whether anything changed.
    pub fn apply_to(self, book: &mut Book) -> bool {
        let mut changed = false;

        if let Some(title) = self.title.filter(|t| !t.is_empty()) {
            changed |= book.title != title;
            book.title = title;
        }
        if let Some(pages) = self.pages.filter(|p| *p != 0) {
            changed |= book.pages != pages;
            book.pages = pages;
        }

        changed
    }
}

/// Current time truncated to the millisecond precision the store keeps, so a
/// record reads back exactly as it was written.
pub(crate) fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stored_book() -> Book {
        Book::new("Narnia", 222)
    }

    #[test]
    fn book_id_round_trips_through_hex() {
        let id = BookId::generate();
        let parsed = BookId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn malformed_book_id_is_invalid_identifier() {
        let err = BookId::parse("not-an-id").unwrap_err();
        assert!(matches!(err, BookError::InvalidIdentifier(raw) if raw == "not-an-id"));
    }

    #[test]
    fn book_serializes_id_as_hex_string() {
        let mut book = stored_book();
        let id = BookId::generate();
        book.id = Some(id);

        let json = serde_json::to_value(&book).unwrap();

        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["title"], "Narnia");
        assert_eq!(json["pages"], 222);
        assert!(json["created_at"].is_string());
    }

    #[test]
    fn unsaved_book_has_no_id_member() {
        let json = serde_json::to_value(stored_book()).unwrap();
        assert!(json.get("id").is_none());
    }

    #[test]
    fn new_book_has_equal_timestamps() {
        let book = stored_book();
        assert_eq!(book.created_at, book.updated_at);
        assert_eq!(book.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn create_request_tolerates_missing_members() {
        let request: CreateBook = serde_json::from_str("{}").unwrap();
        assert_eq!(request.title, "");
        assert_eq!(request.pages, 0);
    }

    #[test]
    fn update_with_only_pages_keeps_title() {
        let mut book = stored_book();
        let patch = UpdateBook {
            title: None,
            pages: Some(300),
        };

        assert!(patch.apply_to(&mut book));
        assert_eq!(book.title, "Narnia");
        assert_eq!(book.pages, 300);
    }

    #[test]
    fn update_with_only_title_keeps_pages() {
        let mut book = stored_book();
        let patch = UpdateBook {
            title: Some("The Silver Chair".to_string()),
            pages: None,
        };

        assert!(patch.apply_to(&mut book));
        assert_eq!(book.title, "The Silver Chair");
        assert_eq!(book.pages, 222);
    }

    #[test]
    fn zero_pages_and_empty_title_are_ignored() {
        let mut book = stored_book();
        let patch: UpdateBook = serde_json::from_str(r#"{"title": "", "pages": 0}"#).unwrap();

        assert!(!patch.apply_to(&mut book));
        assert_eq!(book.title, "Narnia");
        assert_eq!(book.pages, 222);
    }
}
