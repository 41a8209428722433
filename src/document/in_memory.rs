//! InMemoryDocumentStore - HashMap-backed document store for tests and local development.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    Direction, Document, DocumentStore, DocumentWrite, Fields, Query, SnapshotListener, WatchId,
};
use crate::error::StoreError;
use crate::model::Timestamp;

type Collections = HashMap<String, HashMap<String, Fields>>;

struct Watcher {
    query: Query,
    feed: Arc<Feed>,
}

/// One open feed. Deliveries are serialized and carry the sequence number
/// taken when their snapshot was computed; anything older than the last
/// delivered snapshot is dropped.
///
/// The listener runs while the feed is held, so it must not write to the
/// collection it watches.
struct Feed {
    listener: SnapshotListener,
    delivered: Mutex<u64>,
}

impl Feed {
    fn new(listener: SnapshotListener) -> Self {
        Self {
            listener,
            delivered: Mutex::new(0),
        }
    }

    fn deliver(&self, sequence: u64, snapshot: Result<Vec<Document>, StoreError>) -> bool {
        let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        if sequence <= *delivered {
            debug!(sequence, delivered = *delivered, "dropping stale snapshot");
            return false;
        }
        *delivered = sequence;
        (self.listener)(snapshot);
        true
    }
}

/// In-memory document store with push feeds.
///
/// Clone-friendly via Arc; clones share documents and feeds. The store can
/// be switched offline to simulate an unreachable backend: every call then
/// fails with [`StoreError::Unavailable`], and [`fail_feeds`](Self::fail_feeds)
/// pushes an error to every open feed.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
    watchers: Arc<Mutex<HashMap<WatchId, Watcher>>>,
    next_watch: Arc<AtomicU64>,
    sequence: Arc<AtomicU64>,
    offline: Arc<AtomicBool>,
    clock: Arc<Mutex<Timestamp>>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            watchers: Arc::new(Mutex::new(HashMap::new())),
            next_watch: Arc::new(AtomicU64::new(1)),
            sequence: Arc::new(AtomicU64::new(1)),
            offline: Arc::new(AtomicBool::new(false)),
            clock: Arc::new(Mutex::new(DateTime::<Utc>::MIN_UTC)),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(AtomicOrdering::SeqCst)
    }

    /// Stores a document under a caller-chosen id, bypassing the offline
    /// switch. Open feeds on the collection receive a new snapshot.
    pub fn insert(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        {
            let mut collections = self.write_collections()?;
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), fields);
        }
        self.notify(collection);
        Ok(())
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Fields> {
        self.collections
            .read()
            .ok()?
            .get(collection)?
            .get(id)
            .cloned()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map(|docs| docs.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Number of open push feeds.
    pub fn feed_count(&self) -> usize {
        self.watchers.lock().map(|w| w.len()).unwrap_or(0)
    }

    /// Delivers an error to every open feed without closing any of them.
    pub fn fail_feeds(&self, message: &str) {
        let feeds: Vec<(Arc<Feed>, u64)> = match self.watchers.lock() {
            Ok(watchers) => watchers
                .values()
                .map(|w| (Arc::clone(&w.feed), self.next_sequence()))
                .collect(),
            Err(_) => return,
        };
        for (feed, sequence) in feeds {
            feed.deliver(sequence, Err(StoreError::Unavailable(message.to_string())));
        }
    }

    /// Taken while the feed registry is locked, so sequence order matches
    /// the order snapshots were computed in.
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, AtomicOrdering::SeqCst)
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.is_offline() {
            Err(StoreError::Unavailable(
                "in-memory document store is offline".into(),
            ))
        } else {
            Ok(())
        }
    }

    fn write_collections(&self) -> Result<std::sync::RwLockWriteGuard<'_, Collections>, StoreError> {
        self.collections
            .write()
            .map_err(|_| StoreError::Backend("document store lock poisoned".into()))
    }

    /// Server clock. Strictly increasing so documents written back to back
    /// keep their write order.
    fn server_now(&self) -> Result<Value, StoreError> {
        let mut last = self
            .clock
            .lock()
            .map_err(|_| StoreError::Backend("server clock lock poisoned".into()))?;
        let now = Utc::now().max(*last + Duration::microseconds(1));
        *last = now;
        Ok(Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, true)))
    }

    fn apply_write(&self, target: &mut Fields, write: DocumentWrite) -> Result<(), StoreError> {
        target.extend(write.fields);
        if !write.server_timestamps.is_empty() {
            let now = self.server_now()?;
            for field in write.server_timestamps {
                target.insert(field, now.clone());
            }
        }
        Ok(())
    }

    fn run_query(collections: &Collections, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| query.matches(fields))
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default();

        match &query.order_by {
            Some((field, direction)) => docs.sort_by(|a, b| {
                let ord = compare_values(a.fields.get(field), b.fields.get(field))
                    .then_with(|| a.id.cmp(&b.id));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }),
            None => docs.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        docs
    }

    /// Pushes a fresh snapshot to every feed on `collection`. Listeners run
    /// after the registry and document locks are released.
    fn notify(&self, collection: &str) {
        let deliveries: Vec<(Arc<Feed>, u64, Vec<Document>)> = {
            let (watchers, collections) = match (self.watchers.lock(), self.collections.read()) {
                (Ok(w), Ok(c)) => (w, c),
                _ => {
                    warn!(collection, "skipping feed notification, lock poisoned");
                    return;
                }
            };
            watchers
                .values()
                .filter(|w| w.query.collection == collection)
                .map(|w| {
                    let snapshot = Self::run_query(&collections, &w.query);
                    (Arc::clone(&w.feed), self.next_sequence(), snapshot)
                })
                .collect()
        };

        debug!(collection, feeds = deliveries.len(), "pushing snapshots");
        for (feed, sequence, snapshot) in deliveries {
            feed.deliver(sequence, Ok(snapshot));
        }
    }
}

/// Orders JSON values: RFC 3339 strings as instants, numbers numerically,
/// other strings lexically, missing values first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn ping(&self) -> Result<(), StoreError> {
        self.ensure_online()
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.ensure_online()?;
        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::Backend("document store lock poisoned".into()))?;
        Ok(Self::run_query(&collections, query))
    }

    fn add(&self, collection: &str, write: DocumentWrite) -> Result<String, StoreError> {
        self.ensure_online()?;
        let id = Uuid::new_v4().simple().to_string();
        let mut fields = Fields::new();
        self.apply_write(&mut fields, write)?;
        {
            let mut collections = self.write_collections()?;
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.clone(), fields);
        }
        self.notify(collection);
        Ok(id)
    }

    fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<(), StoreError> {
        self.ensure_online()?;
        {
            let mut collections = self.write_collections()?;
            let target = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            self.apply_write(target, write)?;
        }
        self.notify(collection);
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        let removed = {
            let mut collections = self.write_collections()?;
            collections
                .get_mut(collection)
                .and_then(|docs| docs.remove(id))
                .is_some()
        };
        if removed {
            self.notify(collection);
        }
        Ok(())
    }

    fn watch(&self, query: Query, listener: SnapshotListener) -> Result<WatchId, StoreError> {
        self.ensure_online()?;
        let id = WatchId(self.next_watch.fetch_add(1, AtomicOrdering::Relaxed));
        // Same lock order as `notify`: registry, then documents.
        let (feed, sequence, initial) = {
            let mut watchers = self
                .watchers
                .lock()
                .map_err(|_| StoreError::Backend("feed registry lock poisoned".into()))?;
            let collections = self
                .collections
                .read()
                .map_err(|_| StoreError::Backend("document store lock poisoned".into()))?;
            let initial = Self::run_query(&collections, &query);
            let feed = Arc::new(Feed::new(listener));
            watchers.insert(
                id,
                Watcher {
                    query,
                    feed: Arc::clone(&feed),
                },
            );
            (feed, self.next_sequence(), initial)
        };
        feed.deliver(sequence, Ok(initial));
        Ok(id)
    }

    fn unwatch(&self, id: WatchId) {
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.remove(&id);
        }
    }
}
