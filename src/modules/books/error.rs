use std::fmt;

use bookstore_http::error::AppError;
use serde::Serialize;
use thiserror::Error;

/// A broken validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: &'static str,
    pub rule: Rule,
    pub message: String,
}

/// Validation rules, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// `title` must be non-empty.
    Required,
    /// `pages` must be present and at least 1.
    MinPages,
    /// No other book may share the `(title, pages)` pair.
    Unique,
}

impl Violation {
    pub fn duplicate(title: &str, pages: i64) -> Self {
        Self {
            field: "title",
            rule: Rule::Unique,
            message: format!("book with title {} and pages {} already exists", title, pages),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Non-empty list of violations, joined with `; ` when displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    pub fn is_duplicate(&self) -> bool {
        self.0.iter().any(|v| v.rule == Rule::Unique)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, violation) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

/// Failure kinds of the books module. The service returns them unchanged and the
/// HTTP layer picks the status from the variant.
#[derive(Debug, Error)]
pub enum BookError {
    #[error("'{0}' is not a valid book identifier")]
    InvalidIdentifier(String),

    #[error("no book found with id {0}")]
    NotFound(String),

    #[error("book validation failed: {0}")]
    ValidationFailed(Violations),

    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(anyhow::Error),

    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl BookError {
    pub fn duplicate(title: &str, pages: i64) -> Self {
        BookError::ValidationFailed(Violations(vec![Violation::duplicate(title, pages)]))
    }

    pub fn storage(err: impl Into<anyhow::Error>) -> Self {
        BookError::StorageUnavailable(err.into())
    }
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        let message = err.to_string();
        match err {
            BookError::InvalidIdentifier(_) => {
                AppError::bad_request(message).with_code("invalid_identifier")
            }
            BookError::NotFound(_) => AppError::not_found(message),
            BookError::ValidationFailed(violations) => {
                let code = if violations.is_duplicate() {
                    "duplicate_book"
                } else {
                    "validation_error"
                };
                let details = violations
                    .0
                    .iter()
                    .filter_map(|v| serde_json::to_value(v).ok())
                    .collect();
                AppError::validation(details, message).with_code(code)
            }
            BookError::StorageUnavailable(source) => {
                AppError::Internal(source.context("storage unavailable"))
            }
            BookError::Unclassified(source) => AppError::Internal(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use pretty_assertions::assert_eq;

    fn structural() -> BookError {
        BookError::ValidationFailed(Violations(vec![
            Violation {
                field: "title",
                rule: Rule::Required,
                message: "title must not be empty".to_string(),
            },
            Violation {
                field: "pages",
                rule: Rule::MinPages,
                message: "pages is required and must be at least 1".to_string(),
            },
        ]))
    }

    #[test]
    fn validation_message_lists_every_violation() {
        assert_eq!(
            structural().to_string(),
            "book validation failed: title must not be empty; pages is required and must be at least 1"
        );
    }

    #[test]
    fn duplicate_message_names_title_and_pages() {
        assert_eq!(
            BookError::duplicate("Narnia", 222).to_string(),
            "book validation failed: book with title Narnia and pages 222 already exists"
        );
    }

    #[test]
    fn every_kind_maps_to_its_status() {
        let cases = [
            (BookError::InvalidIdentifier("x".into()), StatusCode::BAD_REQUEST),
            (structural(), StatusCode::BAD_REQUEST),
            (BookError::duplicate("Narnia", 222), StatusCode::BAD_REQUEST),
            (BookError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                BookError::storage(anyhow::anyhow!("connection reset")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                BookError::Unclassified(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn duplicate_and_structural_failures_carry_distinct_codes() {
        let duplicate = AppError::from(BookError::duplicate("Narnia", 222));
        let structural = AppError::from(structural());

        match (duplicate, structural) {
            (
                AppError::Validation { code: dup, .. },
                AppError::Validation {
                    code: other,
                    details,
                    ..
                },
            ) => {
                assert_eq!(dup, "duplicate_book");
                assert_eq!(other, "validation_error");
                assert_eq!(details[1]["field"], "pages");
                assert_eq!(details[1]["rule"], "min_pages");
            }
            _ => panic!("expected validation errors"),
        }
    }
}
