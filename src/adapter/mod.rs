//! Library store: CRUD, filters and live feeds over books and members.
//!
//! [`LibraryStore`] has two implementations, chosen once by
//! [`select_store`]:
//!
//! - [`RemoteStore`] talks to a [`DocumentStore`]. Reads that fail are
//!   answered from its own [`DemoStore`]; writes that fail return
//!   [`LibraryError::Write`].
//! - [`DemoStore`] keeps the seed dataset in memory. Mutations live only
//!   as long as the instance.
//!
//! Callers never branch on which one they hold.

mod demo;
mod remote;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::BackendConfig;
use crate::document::DocumentStore;
use crate::error::LibraryError;
use crate::live::{SnapshotCallback, Subscription};
use crate::model::{Book, BookPatch, BookStatus, Member, MemberPatch, NewBook, NewMember};

pub use demo::{demo_books, demo_members, DemoStore};
pub use remote::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Remote,
    Demo,
}

/// Everything the context needs from a backend.
///
/// Reads are infallible: a backend that cannot answer is replaced by the
/// demo dataset. Book search fetches the whole collection and filters
/// locally, so it costs O(collection size) per call.
pub trait LibraryStore: Send + Sync {
    fn mode(&self) -> BackendMode;

    /// All books, newest first.
    fn all_books(&self) -> Vec<Book>;

    /// The `limit` newest books.
    fn recent_books(&self, limit: usize) -> Vec<Book>;

    /// Validates and adds a book; returns its id.
    fn add_book(&self, book: NewBook) -> Result<String, LibraryError>;

    fn update_book(&self, id: &str, patch: BookPatch) -> Result<(), LibraryError>;

    /// Deletes a book. Deleting an unknown id does nothing.
    fn delete_book(&self, id: &str) -> Result<(), LibraryError>;

    /// Case-insensitive substring search over title and author.
    fn search_books(&self, term: &str) -> Vec<Book>;

    fn books_by_category(&self, category: &str) -> Vec<Book>;

    fn books_by_status(&self, status: BookStatus) -> Vec<Book>;

    /// All members, most recently joined first.
    fn all_members(&self) -> Vec<Member>;

    fn add_member(&self, member: NewMember) -> Result<String, LibraryError>;

    fn update_member(&self, id: &str, patch: MemberPatch) -> Result<(), LibraryError>;

    fn delete_member(&self, id: &str) -> Result<(), LibraryError>;

    /// Live feed of the book collection.
    fn subscribe_books(&self, callback: SnapshotCallback<Book>) -> Subscription;

    /// Live feed of the member collection.
    fn subscribe_members(&self, callback: SnapshotCallback<Member>) -> Subscription;
}

/// Picks the backend once, at startup.
///
/// The remote store is used only when the configuration carries real
/// credentials, a document backend was supplied and it answers a ping.
pub fn select_store<D>(config: &BackendConfig, documents: Option<Arc<D>>) -> Arc<dyn LibraryStore>
where
    D: DocumentStore + ?Sized + 'static,
{
    if !config.is_configured() {
        info!("backend not configured, running in demo mode");
        return Arc::new(DemoStore::seeded());
    }

    let Some(documents) = documents else {
        warn!("backend configured but no document store supplied, running in demo mode");
        return Arc::new(DemoStore::seeded());
    };

    match documents.ping() {
        Ok(()) => {
            info!(project = %config.project_id, "connected to document store");
            Arc::new(RemoteStore::new(documents))
        }
        Err(e) => {
            warn!(error = %e, "document store unreachable, running in demo mode");
            Arc::new(DemoStore::seeded())
        }
    }
}
