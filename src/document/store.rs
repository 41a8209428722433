use super::{Document, DocumentWrite, Query, SnapshotListener, WatchId};
use crate::error::StoreError;

/// A document database holding named collections.
///
/// Writes are single-document and not transactional; multi-field updates
/// on different documents are never atomic.
pub trait DocumentStore: Send + Sync {
    /// Checks that the backend is reachable.
    fn ping(&self) -> Result<(), StoreError>;

    /// Runs a query and returns matching documents in query order.
    fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Adds a document and returns the id the backend assigned.
    fn add(&self, collection: &str, write: DocumentWrite) -> Result<String, StoreError>;

    /// Merges fields into an existing document. Fails with `NotFound` when
    /// the document does not exist.
    fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<(), StoreError>;

    /// Deletes a document. Deleting a missing document succeeds.
    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Opens a push feed. The listener gets the current snapshot right away
    /// and a full snapshot after every change to the queried collection.
    fn watch(&self, query: Query, listener: SnapshotListener) -> Result<WatchId, StoreError>;

    /// Stops a push feed. Unknown ids are ignored.
    fn unwatch(&self, id: WatchId);
}
