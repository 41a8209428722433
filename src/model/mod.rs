//! Library entities and the payloads used to create and patch them.
//!
//! Every stored entity implements [`Record`], usually through
//! `#[derive(Record)]`. The trait tells the backends which collection an
//! entity lives in and which field to order snapshots by.
//!
//! ```ignore
//! use library_sync::{Record, Timestamp};
//!
//! #[derive(Clone, Serialize, Deserialize, Record)]
//! #[serde(rename_all = "camelCase")]
//! #[record(collection = "books")]
//! struct Book {
//!     id: String,
//!     title: String,
//!     #[record(created)]
//!     added_at: Timestamp,
//! }
//! ```

mod book;
mod member;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::LibraryError;

pub use book::{Book, BookPatch, BookStatus, NewBook};
pub use member::{Member, MemberPatch, NewMember};

/// Wall-clock instant used for every stored timestamp.
pub type Timestamp = DateTime<Utc>;

/// Trait for entities stored in a backend collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Backend collection name ("books", "members").
    const COLLECTION: &'static str;

    /// Wire name of the creation timestamp; snapshots are ordered by it, newest first.
    const CREATED_FIELD: &'static str;

    /// Identifier assigned by the store. Never changes once assigned.
    fn id(&self) -> &str;

    fn created_at(&self) -> Timestamp;
}

/// Sorts records newest first, the order every read and snapshot uses.
pub fn sort_newest_first<R: Record>(records: &mut [R]) {
    records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

/// Collects the names of required fields that are blank.
pub(crate) fn require_filled(fields: &[(&'static str, &str)]) -> Result<(), LibraryError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(LibraryError::Validation(format!(
            "Please fill in all required fields: {}.",
            missing.join(", ")
        )))
    }
}

/// Rejects a patch that would blank out a required field.
pub(crate) fn reject_blank(fields: &[(&'static str, Option<&str>)]) -> Result<(), LibraryError> {
    let present: Vec<(&'static str, &str)> = fields
        .iter()
        .filter_map(|(name, value)| value.map(|v| (*name, v)))
        .collect();
    require_filled(&present)
}
