//! Rules a book must satisfy before it is written.
//!
//! Structural rules come from the `validator` derive on [`Book`] and are all
//! reported together. The uniqueness rule needs a well-formed candidate and a
//! round-trip to the store, so it only runs once the structure is sound.

use validator::{Validate, ValidationErrors};

use super::error::{BookError, Rule, Violation, Violations};
use super::models::Book;
use super::repository::BookStore;

/// Structural rules in reporting order.
const STRUCTURAL_RULES: &[(&str, Rule)] = &[("title", Rule::Required), ("pages", Rule::MinPages)];

/// Validate a book about to be created: structure first, then uniqueness of its
/// `(title, pages)` pair.
pub async fn validate_new(book: &Book, store: &dyn BookStore) -> Result<(), BookError> {
    validate_structure(book)?;

    if is_duplicate(store, &book.title, book.pages).await {
        return Err(BookError::duplicate(&book.title, book.pages));
    }

    Ok(())
}

/// Check the field-level rules only.
pub fn validate_structure(book: &Book) -> Result<(), BookError> {
    book.validate()
        .map_err(|errors| BookError::ValidationFailed(Violations(structural_violations(&errors))))
}

fn structural_violations(errors: &ValidationErrors) -> Vec<Violation> {
    let field_errors = errors.field_errors();

    STRUCTURAL_RULES
        .iter()
        .filter_map(|&(field, rule)| {
            let error = field_errors.get(field)?.first()?;
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", field));
            Some(Violation {
                field,
                rule,
                message,
            })
        })
        .collect()
}

/// Fails closed: when the store cannot answer, the book is treated as already
/// present rather than risking a duplicate.
async fn is_duplicate(store: &dyn BookStore, title: &str, pages: i64) -> bool {
    match store.count(title, pages).await {
        Ok(count) => count > 0,
        Err(err) => {
            tracing::warn!(
                error = %err,
                title,
                pages,
                "uniqueness check failed; treating book as a duplicate"
            );
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::repository::memory::InMemoryBookStore;
    use pretty_assertions::assert_eq;

    fn violations(err: BookError) -> Vec<Violation> {
        match err {
            BookError::ValidationFailed(Violations(list)) => list,
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn well_formed_unique_book_passes() {
        let store = InMemoryBookStore::new();
        assert!(validate_new(&Book::new("Narnia", 222), &store).await.is_ok());
    }

    #[tokio::test]
    async fn empty_title_is_reported_by_field() {
        let store = InMemoryBookStore::new();

        let err = validate_new(&Book::new("", 222), &store).await.unwrap_err();

        let list = violations(err);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].field, "title");
        assert_eq!(list[0].rule, Rule::Required);
    }

    #[tokio::test]
    async fn non_positive_pages_are_structural_errors() {
        let store = InMemoryBookStore::new();

        for pages in [0, -5] {
            let err = validate_new(&Book::new("Narnia", pages), &store).await.unwrap_err();

            let list = violations(err);
            assert_eq!(list[0].field, "pages");
            assert_eq!(list[0].rule, Rule::MinPages);
        }
    }

    #[tokio::test]
    async fn all_structural_violations_are_reported_in_order() {
        let store = InMemoryBookStore::new();

        let err = validate_new(&Book::new("", 0), &store).await.unwrap_err();

        let fields: Vec<&str> = violations(err).iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["title", "pages"]);
    }

    #[tokio::test]
    async fn structural_failure_skips_the_store() {
        let store = InMemoryBookStore::new();
        store.fail_counts(true);

        let err = validate_new(&Book::new("", 10), &store).await.unwrap_err();

        assert!(violations(err).iter().all(|v| v.rule != Rule::Unique));
    }

    #[tokio::test]
    async fn existing_pair_is_a_duplicate() {
        let store = InMemoryBookStore::new();
        store.insert(&Book::new("Narnia", 222)).await.unwrap();

        let err = validate_new(&Book::new("Narnia", 222), &store).await.unwrap_err();

        let list = violations(err);
        assert_eq!(list[0].rule, Rule::Unique);
        assert_eq!(list[0].message, "book with title Narnia and pages 222 already exists");
    }

    #[tokio::test]
    async fn same_title_with_other_page_count_is_allowed() {
        let store = InMemoryBookStore::new();
        store.insert(&Book::new("Narnia", 222)).await.unwrap();

        assert!(validate_new(&Book::new("Narnia", 223), &store).await.is_ok());
    }

    #[tokio::test]
    async fn failing_count_is_treated_as_duplicate() {
        let store = InMemoryBookStore::new();
        store.fail_counts(true);

        let err = validate_new(&Book::new("Narnia", 222), &store).await.unwrap_err();

        assert_eq!(violations(err)[0].rule, Rule::Unique);
    }
}
