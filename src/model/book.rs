use serde::{Deserialize, Serialize};
use std::fmt;

use super::{reject_blank, require_filled, Timestamp};
use crate::error::LibraryError;
use crate::Record;

/// Circulation state of a book. Exactly two values exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookStatus {
    Available,
    CheckedOut,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::CheckedOut => "checked-out",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(collection = "books")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    /// Free-text label, matched exactly by category filters.
    pub category: String,
    pub status: BookStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[record(created)]
    pub added_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Book {
    /// Case-insensitive substring match against title and author.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.title.to_lowercase().contains(&term) || self.author.to_lowercase().contains(&term)
    }
}

/// Fields supplied when adding a book. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub category: String,
    pub status: BookStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewBook {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            category: category.into(),
            status: BookStatus::Available,
            image_url: None,
        }
    }

    pub fn with_status(mut self, status: BookStatus) -> Self {
        self.status = status;
        self
    }

    pub fn validate(&self) -> Result<(), LibraryError> {
        require_filled(&[
            ("title", self.title.as_str()),
            ("author", self.author.as_str()),
            ("category", self.category.as_str()),
        ])
    }

    pub(crate) fn into_book(self, id: String, now: Timestamp) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            category: self.category,
            status: self.status,
            image_url: self.image_url,
            added_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a book. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BookStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl BookPatch {
    pub fn status(status: BookStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), LibraryError> {
        reject_blank(&[
            ("title", self.title.as_deref()),
            ("author", self.author.as_deref()),
            ("category", self.category.as_deref()),
        ])
    }

    /// Merges the present fields into `book`. Timestamps are left alone.
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(title) = &self.title {
            book.title = title.clone();
        }
        if let Some(author) = &self.author {
            book.author = author.clone();
        }
        if let Some(category) = &self.category {
            book.category = category.clone();
        }
        if let Some(status) = self.status {
            book.status = status;
        }
        if let Some(url) = &self.image_url {
            book.image_url = Some(url.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn book(title: &str, author: &str) -> Book {
        let at = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        NewBook::new(title, author, "Fiction").into_book("b1".into(), at)
    }

    #[test]
    fn status_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&BookStatus::CheckedOut).unwrap();
        assert_eq!(json, "\"checked-out\"");
        let status: BookStatus = serde_json::from_str("\"available\"").unwrap();
        assert_eq!(status, BookStatus::Available);
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(serde_json::from_str::<BookStatus>("\"lost\"").is_err());
    }

    #[test]
    fn book_fields_are_camel_case() {
        let value = serde_json::to_value(book("Dune", "Frank Herbert")).unwrap();
        assert!(value.get("addedAt").is_some());
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("imageUrl").is_none());
    }

    #[test]
    fn record_derive_reports_collection_and_order_field() {
        let b = book("Dune", "Frank Herbert");
        assert_eq!(Book::COLLECTION, "books");
        assert_eq!(Book::CREATED_FIELD, "addedAt");
        assert_eq!(b.id(), "b1");
        assert_eq!(b.created_at(), b.added_at);
    }

    #[test]
    fn matches_title_or_author_ignoring_case() {
        let b = book("The Mockingbird Returns", "Anon");
        assert!(b.matches("mock"));
        assert!(b.matches("MOCK"));
        assert!(b.matches("anon"));
        assert!(!b.matches("gatsby"));
    }

    #[test]
    fn new_book_requires_title_author_category() {
        let err = NewBook::new("", " ", "Fiction").validate().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Please fill in all required fields: title, author."
        );
        assert!(NewBook::new("Dune", "Frank Herbert", "SF").validate().is_ok());
    }

    #[test]
    fn patch_rejects_blanking_required_fields() {
        let patch = BookPatch {
            title: Some("  ".into()),
            ..BookPatch::default()
        };
        assert!(patch.validate().is_err());
        assert!(BookPatch::status(BookStatus::CheckedOut).validate().is_ok());
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let mut b = book("Dune", "Frank Herbert");
        let before = b.updated_at;
        BookPatch::status(BookStatus::CheckedOut).apply_to(&mut b);
        assert_eq!(b.status, BookStatus::CheckedOut);
        assert_eq!(b.title, "Dune");
        assert_eq!(b.updated_at, before);
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let value = serde_json::to_value(BookPatch::image_url("memory://x")).unwrap();
        assert_eq!(value, serde_json::json!({ "imageUrl": "memory://x" }));
    }
}
