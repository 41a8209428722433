use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{SnapshotCallback, SnapshotSink, Subscription};
use crate::document::{decode_documents, Document, DocumentStore, Query, SnapshotListener};
use crate::error::StoreError;
use crate::model::Record;

/// Runs `callback` once with `snapshot` and returns a closed handle.
pub fn deliver_once<R: Record>(snapshot: Vec<R>, callback: SnapshotCallback<R>) -> Subscription {
    debug!(collection = R::COLLECTION, len = snapshot.len(), "delivering one-shot snapshot");
    callback(snapshot);
    Subscription::noop()
}

/// Opens a backend feed for `query`, forwarding decoded snapshots.
///
/// When the backend refuses the feed, `fallback` is delivered once and a
/// closed handle is returned. When an open feed reports an error,
/// `fallback` is delivered and the feed stays open.
pub fn watch_collection<R, D>(
    documents: &Arc<D>,
    query: Query,
    fallback: Vec<R>,
    callback: SnapshotCallback<R>,
) -> Subscription
where
    R: Record,
    D: DocumentStore + ?Sized + 'static,
{
    let active = Arc::new(AtomicBool::new(true));
    let sink = SnapshotSink::new(Arc::clone(&active), callback);

    let feed_sink = sink.clone();
    let feed_fallback = fallback.clone();
    let listener: SnapshotListener =
        Arc::new(move |event: Result<Vec<Document>, StoreError>| match event {
            Ok(docs) => {
                debug!(collection = R::COLLECTION, len = docs.len(), "snapshot received");
                feed_sink.deliver(decode_documents::<R>(R::COLLECTION, &docs));
            }
            Err(e) => {
                warn!(
                    collection = R::COLLECTION,
                    error = %e,
                    "live feed error, delivering demo snapshot"
                );
                feed_sink.deliver(feed_fallback.clone());
            }
        });

    match documents.watch(query, listener) {
        Ok(watch_id) => {
            let documents = Arc::clone(documents);
            Subscription::new(
                active,
                Some(Box::new(move || documents.unwatch(watch_id))),
            )
        }
        Err(e) => {
            warn!(
                collection = R::COLLECTION,
                error = %e,
                "could not open live feed, delivering demo snapshot"
            );
            sink.deliver(fallback);
            let subscription = Subscription::new(active, None);
            subscription.close();
            subscription
        }
    }
}
