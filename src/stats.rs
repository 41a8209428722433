//! Derived library statistics.

use serde::{Deserialize, Serialize};

use crate::model::{Book, BookStatus, Member};

/// Counts derived from the current collections. Never persisted.
///
/// `available_books + checked_out_books == total_books` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub total_books: u32,
    pub available_books: u32,
    pub checked_out_books: u32,
    pub total_members: u32,
}

/// Computes stats from the given collections. Pure.
pub fn compute_stats(books: &[Book], members: &[Member]) -> LibraryStats {
    let (available, checked_out) =
        books
            .iter()
            .fold((0u32, 0u32), |(available, checked_out), book| match book.status {
                BookStatus::Available => (available.saturating_add(1), checked_out),
                BookStatus::CheckedOut => (available, checked_out.saturating_add(1)),
            });

    LibraryStats {
        total_books: available.saturating_add(checked_out),
        available_books: available,
        checked_out_books: checked_out,
        total_members: u32::try_from(members.len()).unwrap_or(u32::MAX),
    }
}
