//! LibraryContext - the single access point for the dashboard.
//!
//! The context owns the in-memory copies of both collections and the
//! derived stats. It moves through three phases:
//!
//! ```text
//! Initializing ──start()──▶ Live ──shutdown()──▶ Unmounted
//! ```
//!
//! While `Initializing`, `is_loading()` is true. `start()` opens both feeds
//! and loads the initial stats. After `shutdown()` every late snapshot is
//! dropped: the phase flag is checked under the state lock before any
//! update is applied.
//!
//! Mutations go through the [`LibraryStore`] and return its errors as-is;
//! retrying and notifying the user is up to the caller.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::adapter::{select_store, BackendMode, LibraryStore};
use crate::config::LibraryConfig;
use crate::document::DocumentStore;
use crate::error::LibraryError;
use crate::export::{export_books, BookExport};
use crate::live::Subscription;
use crate::model::{Book, BookPatch, BookStatus, Member, MemberPatch, NewBook, NewMember};
use crate::stats::{compute_stats, LibraryStats};
use crate::storage::{upload_book_image, ImagePayload, ObjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Live,
    Unmounted,
}

#[derive(Debug)]
struct LibraryState {
    phase: Phase,
    loading: bool,
    backend_ready: bool,
    books: Vec<Book>,
    members: Vec<Member>,
    stats: LibraryStats,
}

impl LibraryState {
    fn new() -> Self {
        Self {
            phase: Phase::Initializing,
            loading: true,
            backend_ready: false,
            books: Vec::new(),
            members: Vec::new(),
            stats: LibraryStats::default(),
        }
    }
}

/// Applies a snapshot unless the context is unmounted, then recomputes stats.
fn apply_snapshot(state: &RwLock<LibraryState>, update: impl FnOnce(&mut LibraryState)) {
    let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
    if state.phase == Phase::Unmounted {
        debug!("dropping snapshot delivered after shutdown");
        return;
    }
    update(&mut state);
    state.stats = compute_stats(&state.books, &state.members);
}

pub struct LibraryContext {
    store: Arc<dyn LibraryStore>,
    images: Option<Arc<dyn ObjectStore>>,
    state: Arc<RwLock<LibraryState>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl LibraryContext {
    /// Wraps an already selected store. `images` is used only when the
    /// store is remote; a remote store without one rejects book images.
    pub fn new(store: Arc<dyn LibraryStore>, images: Option<Arc<dyn ObjectStore>>) -> Self {
        Self {
            store,
            images,
            state: Arc::new(RwLock::new(LibraryState::new())),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Selects the backend from `config` and wraps it.
    pub fn connect<D>(
        config: &LibraryConfig,
        documents: Option<Arc<D>>,
        images: Option<Arc<dyn ObjectStore>>,
    ) -> Self
    where
        D: DocumentStore + ?Sized + 'static,
    {
        Self::new(select_store(&config.backend, documents), images)
    }

    /// Opens the live feeds and loads the initial stats. Calling it again,
    /// or after `shutdown`, does nothing.
    pub fn start(&self) -> Result<(), LibraryError> {
        {
            let mut state = self
                .state
                .write()
                .map_err(|_| LibraryError::LockPoisoned("start"))?;
            if state.phase != Phase::Initializing {
                debug!(phase = ?state.phase, "start ignored");
                return Ok(());
            }
            state.backend_ready = self.store.mode() == BackendMode::Remote;
        }

        let books_state = Arc::clone(&self.state);
        let books = self.store.subscribe_books(Box::new(move |books: Vec<Book>| {
            apply_snapshot(&books_state, |state| state.books = books)
        }));
        let members_state = Arc::clone(&self.state);
        let members = self.store.subscribe_members(Box::new(move |members: Vec<Member>| {
            apply_snapshot(&members_state, |state| state.members = members)
        }));

        self.subscriptions
            .lock()
            .map_err(|_| LibraryError::LockPoisoned("start"))?
            .extend([books, members]);

        let stats = compute_stats(&self.store.all_books(), &self.store.all_members());

        let mut state = self
            .state
            .write()
            .map_err(|_| LibraryError::LockPoisoned("start"))?;
        if state.phase == Phase::Unmounted {
            drop(state);
            self.close_subscriptions();
            return Ok(());
        }
        state.phase = Phase::Live;
        state.stats = stats;
        state.loading = false;
        info!(
            mode = ?self.store.mode(),
            books = state.books.len(),
            members = state.members.len(),
            "library context live"
        );
        Ok(())
    }

    /// Tears down the feeds. The phase flips first, so snapshots still in
    /// flight are ignored. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.phase == Phase::Unmounted {
                return;
            }
            state.phase = Phase::Unmounted;
        }
        self.close_subscriptions();
        info!("library context shut down");
    }

    fn close_subscriptions(&self) {
        let subscriptions: Vec<Subscription> = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for subscription in &subscriptions {
            subscription.close();
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LibraryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        self.read_state().phase
    }

    pub fn is_loading(&self) -> bool {
        self.read_state().loading
    }

    /// True when running against the remote backend rather than demo data.
    pub fn backend_ready(&self) -> bool {
        self.read_state().backend_ready
    }

    pub fn mode(&self) -> BackendMode {
        self.store.mode()
    }

    pub fn books(&self) -> Vec<Book> {
        self.read_state().books.clone()
    }

    pub fn members(&self) -> Vec<Member> {
        self.read_state().members.clone()
    }

    pub fn stats(&self) -> LibraryStats {
        self.read_state().stats
    }

    /// Pairs an image with the object store it goes to. Demo mode drops the
    /// image; a remote backend without an object store rejects it.
    fn image_upload(
        &self,
        image: Option<ImagePayload>,
    ) -> Result<Option<(&dyn ObjectStore, ImagePayload)>, LibraryError> {
        let Some(image) = image else {
            return Ok(None);
        };
        match (self.store.mode(), self.images.as_deref()) {
            (BackendMode::Demo, _) => {
                debug!(file = %image.file_name, "image ignored in demo mode");
                Ok(None)
            }
            (BackendMode::Remote, Some(images)) => Ok(Some((images, image))),
            (BackendMode::Remote, None) => {
                error!(file = %image.file_name, "image supplied but no object store configured");
                Err(LibraryError::Storage("no object store configured".into()))
            }
        }
    }

    /// Adds a book and, on the remote backend, uploads its cover and
    /// stores the URL on the record. In demo mode the image is dropped.
    pub fn add_book(
        &self,
        book: NewBook,
        image: Option<ImagePayload>,
    ) -> Result<String, LibraryError> {
        let upload = self.image_upload(image)?;
        let id = self
            .store
            .add_book(book)
            .inspect_err(|e| error!(error = %e, "add book failed"))?;

        if let Some((images, image)) = upload {
            let url = upload_book_image(images, &image, &id)?;
            self.store
                .update_book(&id, BookPatch::image_url(url))
                .inspect_err(|e| error!(id = %id, error = %e, "attach cover failed"))?;
        }
        Ok(id)
    }

    /// Updates a book; an image is uploaded first and its URL merged into
    /// the patch.
    pub fn update_book(
        &self,
        id: &str,
        mut patch: BookPatch,
        image: Option<ImagePayload>,
    ) -> Result<(), LibraryError> {
        if let Some((images, image)) = self.image_upload(image)? {
            patch.image_url = Some(upload_book_image(images, &image, id)?);
        }
        self.store
            .update_book(id, patch)
            .inspect_err(|e| error!(id, error = %e, "update book failed"))
    }

    pub fn delete_book(&self, id: &str) -> Result<(), LibraryError> {
        self.store
            .delete_book(id)
            .inspect_err(|e| error!(id, error = %e, "delete book failed"))
    }

    pub fn add_member(&self, member: NewMember) -> Result<String, LibraryError> {
        self.store
            .add_member(member)
            .inspect_err(|e| error!(error = %e, "add member failed"))
    }

    pub fn update_member(&self, id: &str, patch: MemberPatch) -> Result<(), LibraryError> {
        self.store
            .update_member(id, patch)
            .inspect_err(|e| error!(id, error = %e, "update member failed"))
    }

    pub fn delete_member(&self, id: &str) -> Result<(), LibraryError> {
        self.store
            .delete_member(id)
            .inspect_err(|e| error!(id, error = %e, "delete member failed"))
    }

    pub fn search_books(&self, term: &str) -> Vec<Book> {
        self.store.search_books(term)
    }

    pub fn books_by_category(&self, category: &str) -> Vec<Book> {
        self.store.books_by_category(category)
    }

    pub fn books_by_status(&self, status: BookStatus) -> Vec<Book> {
        self.store.books_by_status(status)
    }

    pub fn recent_books(&self, limit: usize) -> Vec<Book> {
        self.store.recent_books(limit)
    }

    /// Exports the books currently held by the context, dated today (UTC).
    pub fn export_books(&self) -> Result<BookExport, LibraryError> {
        self.export_books_on(Utc::now().date_naive())
    }

    pub fn export_books_on(&self, date: NaiveDate) -> Result<BookExport, LibraryError> {
        export_books(&self.read_state().books, date)
    }

    /// Re-reads both collections from the store and recomputes stats,
    /// independently of the live feeds.
    pub fn refresh_stats(&self) -> Result<LibraryStats, LibraryError> {
        let stats = compute_stats(&self.store.all_books(), &self.store.all_members());
        let mut state = self
            .state
            .write()
            .map_err(|_| LibraryError::LockPoisoned("refresh_stats"))?;
        if state.phase == Phase::Unmounted {
            warn!("refresh_stats after shutdown, result not stored");
        } else {
            state.stats = stats;
        }
        Ok(stats)
    }
}

impl Drop for LibraryContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{DemoStore, RemoteStore};
    use crate::document::InMemoryDocumentStore;
    use crate::live::SnapshotCallback;
    use crate::storage::InMemoryObjectStore;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;

    /// Demo data whose book feed hands its callback to the test instead of
    /// delivering. With a rendezvous, `subscribe_books` blocks on it twice
    /// so the test can act while `start` is mid-flight.
    struct HeldFeeds {
        data: DemoStore,
        books: Mutex<Option<SnapshotCallback<Book>>>,
        feeds: Mutex<Vec<Arc<AtomicBool>>>,
        rendezvous: Option<Arc<Barrier>>,
    }

    impl HeldFeeds {
        fn new(rendezvous: Option<Arc<Barrier>>) -> Self {
            Self {
                data: DemoStore::seeded(),
                books: Mutex::new(None),
                feeds: Mutex::new(Vec::new()),
                rendezvous,
            }
        }

        fn open(&self) -> Subscription {
            let active = Arc::new(AtomicBool::new(true));
            self.feeds.lock().unwrap().push(Arc::clone(&active));
            Subscription::new(active, None)
        }

        fn open_feeds(&self) -> usize {
            self.feeds
                .lock()
                .unwrap()
                .iter()
                .filter(|active| active.load(Ordering::SeqCst))
                .count()
        }
    }

    impl LibraryStore for HeldFeeds {
        fn mode(&self) -> BackendMode {
            self.data.mode()
        }

        fn all_books(&self) -> Vec<Book> {
            self.data.all_books()
        }

        fn recent_books(&self, limit: usize) -> Vec<Book> {
            self.data.recent_books(limit)
        }

        fn add_book(&self, book: NewBook) -> Result<String, LibraryError> {
            self.data.add_book(book)
        }

        fn update_book(&self, id: &str, patch: BookPatch) -> Result<(), LibraryError> {
            self.data.update_book(id, patch)
        }

        fn delete_book(&self, id: &str) -> Result<(), LibraryError> {
            self.data.delete_book(id)
        }

        fn search_books(&self, term: &str) -> Vec<Book> {
            self.data.search_books(term)
        }

        fn books_by_category(&self, category: &str) -> Vec<Book> {
            self.data.books_by_category(category)
        }

        fn books_by_status(&self, status: BookStatus) -> Vec<Book> {
            self.data.books_by_status(status)
        }

        fn all_members(&self) -> Vec<Member> {
            self.data.all_members()
        }

        fn add_member(&self, member: NewMember) -> Result<String, LibraryError> {
            self.data.add_member(member)
        }

        fn update_member(&self, id: &str, patch: MemberPatch) -> Result<(), LibraryError> {
            self.data.update_member(id, patch)
        }

        fn delete_member(&self, id: &str) -> Result<(), LibraryError> {
            self.data.delete_member(id)
        }

        fn subscribe_books(&self, callback: SnapshotCallback<Book>) -> Subscription {
            if let Some(rendezvous) = &self.rendezvous {
                rendezvous.wait();
                rendezvous.wait();
            }
            *self.books.lock().unwrap() = Some(callback);
            self.open()
        }

        fn subscribe_members(&self, _callback: SnapshotCallback<Member>) -> Subscription {
            self.open()
        }
    }

    fn demo_context() -> LibraryContext {
        LibraryContext::new(Arc::new(DemoStore::seeded()), None)
    }

    fn remote_context() -> (
        Arc<InMemoryDocumentStore>,
        Arc<InMemoryObjectStore>,
        LibraryContext,
    ) {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let images = Arc::new(InMemoryObjectStore::new("library-test"));
        let context = LibraryContext::new(
            Arc::new(RemoteStore::new(Arc::clone(&documents))),
            Some(images.clone() as Arc<dyn ObjectStore>),
        );
        (documents, images, context)
    }

    #[test]
    fn starts_loading_in_initializing_phase() {
        let context = demo_context();
        assert_eq!(context.phase(), Phase::Initializing);
        assert!(context.is_loading());
        assert!(context.books().is_empty());
        assert_eq!(context.stats(), LibraryStats::default());
    }

    #[test]
    fn demo_start_mirrors_seed() {
        let context = demo_context();
        context.start().unwrap();

        assert_eq!(context.phase(), Phase::Live);
        assert!(!context.is_loading());
        assert!(!context.backend_ready());
        assert_eq!(context.books().len(), 5);
        assert_eq!(context.members().len(), 3);
        assert_eq!(context.stats().checked_out_books, 1);
    }

    #[test]
    fn remote_snapshots_update_state_and_stats() {
        let (_, _, context) = remote_context();
        context.start().unwrap();
        assert!(context.backend_ready());
        assert_eq!(context.stats().total_books, 0);

        context
            .add_book(NewBook::new("Dune", "Frank Herbert", "SF"), None)
            .unwrap();
        context
            .add_member(NewMember::new("Ada Lovelace", "ada@example.com"))
            .unwrap();

        assert_eq!(context.books()[0].title, "Dune");
        assert_eq!(
            context.stats(),
            LibraryStats {
                total_books: 1,
                available_books: 1,
                checked_out_books: 0,
                total_members: 1,
            }
        );
    }

    #[test]
    fn no_updates_after_shutdown() {
        let (documents, _, context) = remote_context();
        context.start().unwrap();
        context.shutdown();
        context.shutdown();

        context
            .add_book(NewBook::new("Dune", "Frank Herbert", "SF"), None)
            .unwrap();
        assert_eq!(documents.len("books"), 1);
        assert!(context.books().is_empty());
        assert_eq!(documents.feed_count(), 0);
        assert_eq!(context.phase(), Phase::Unmounted);
    }

    #[test]
    fn start_is_idempotent() {
        let (documents, _, context) = remote_context();
        context.start().unwrap();
        context.start().unwrap();
        assert_eq!(documents.feed_count(), 2);
    }

    #[test]
    fn start_after_shutdown_does_nothing() {
        let (documents, _, context) = remote_context();
        context.shutdown();
        context.start().unwrap();
        assert_eq!(documents.feed_count(), 0);
        assert!(context.is_loading());
    }

    #[test]
    fn add_book_uploads_cover_on_remote_backend() {
        let (_, images, context) = remote_context();
        context.start().unwrap();
        let image = ImagePayload::new("cover.png", "image/png", vec![9, 9]);

        let id = context
            .add_book(NewBook::new("Dune", "Frank Herbert", "SF"), Some(image))
            .unwrap();

        let key = format!("books/{}/cover.png", id);
        assert!(images.get(&key).is_some());
        assert_eq!(
            context.books()[0].image_url.as_deref(),
            Some(format!("memory://library-test/{}", key).as_str())
        );
    }

    #[test]
    fn update_book_merges_uploaded_url() {
        let (_, images, context) = remote_context();
        context.start().unwrap();
        let id = context
            .add_book(NewBook::new("Dune", "Frank Herbert", "SF"), None)
            .unwrap();

        context
            .update_book(
                &id,
                BookPatch::status(BookStatus::CheckedOut),
                Some(ImagePayload::new("new.jpg", "image/jpeg", vec![1])),
            )
            .unwrap();

        let book = &context.books()[0];
        assert_eq!(book.status, BookStatus::CheckedOut);
        assert!(book.image_url.as_deref().unwrap().ends_with("/new.jpg"));
        assert_eq!(images.len(), 1);
        assert_eq!(context.stats().checked_out_books, 1);
    }

    #[test]
    fn demo_mode_ignores_images() {
        let images = Arc::new(InMemoryObjectStore::new("unused"));
        let context = LibraryContext::new(
            Arc::new(DemoStore::seeded()),
            Some(images.clone() as Arc<dyn ObjectStore>),
        );
        let id = context
            .add_book(
                NewBook::new("Dune", "Frank Herbert", "SF"),
                Some(ImagePayload::new("cover.png", "image/png", vec![1])),
            )
            .unwrap();

        assert!(images.is_empty());
        let book = context.search_books("dune").into_iter().find(|b| b.id == id).unwrap();
        assert!(book.image_url.is_none());
    }

    #[test]
    fn remote_without_object_store_rejects_images() {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let context = LibraryContext::new(Arc::new(RemoteStore::new(Arc::clone(&documents))), None);
        context.start().unwrap();

        let err = context
            .add_book(
                NewBook::new("Dune", "Frank Herbert", "SF"),
                Some(ImagePayload::new("cover.png", "image/png", vec![1])),
            )
            .unwrap_err();
        assert_eq!(err, LibraryError::Storage("no object store configured".into()));
        assert!(documents.is_empty("books"));

        let id = context
            .add_book(NewBook::new("Dune", "Frank Herbert", "SF"), None)
            .unwrap();
        let err = context
            .update_book(
                &id,
                BookPatch::status(BookStatus::CheckedOut),
                Some(ImagePayload::new("cover.png", "image/png", vec![1])),
            )
            .unwrap_err();
        assert!(matches!(err, LibraryError::Storage(_)));
        assert_eq!(context.books()[0].status, BookStatus::Available);
    }

    #[test]
    fn demo_without_object_store_drops_images() {
        let context = demo_context();
        context.start().unwrap();
        let id = context
            .add_book(
                NewBook::new("Dune", "Frank Herbert", "SF"),
                Some(ImagePayload::new("cover.png", "image/png", vec![1])),
            )
            .unwrap();
        context
            .update_book(
                &id,
                BookPatch::status(BookStatus::CheckedOut),
                Some(ImagePayload::new("back.png", "image/png", vec![2])),
            )
            .unwrap();

        let book = context.search_books("dune").into_iter().find(|b| b.id == id).unwrap();
        assert_eq!(book.status, BookStatus::CheckedOut);
        assert!(book.image_url.is_none());
    }

    #[test]
    fn snapshot_arriving_after_shutdown_is_ignored() {
        let store = Arc::new(HeldFeeds::new(None));
        let context = LibraryContext::new(store.clone() as Arc<dyn LibraryStore>, None);
        context.start().unwrap();
        let deliver = store.books.lock().unwrap().take().unwrap();

        deliver(store.all_books());
        assert_eq!(context.books().len(), 5);

        context.shutdown();
        let stats = context.stats();
        deliver(Vec::new());

        assert_eq!(context.books().len(), 5);
        assert_eq!(context.stats(), stats);
        assert_eq!(context.phase(), Phase::Unmounted);
    }

    #[test]
    fn shutdown_during_start_closes_feeds() {
        let rendezvous = Arc::new(Barrier::new(2));
        let store = Arc::new(HeldFeeds::new(Some(Arc::clone(&rendezvous))));
        let context = LibraryContext::new(store.clone() as Arc<dyn LibraryStore>, None);

        std::thread::scope(|scope| {
            let starting = scope.spawn(|| context.start());
            rendezvous.wait();
            context.shutdown();
            rendezvous.wait();
            starting.join().unwrap().unwrap();
        });

        assert_eq!(context.phase(), Phase::Unmounted);
        assert!(context.is_loading());
        assert_eq!(store.feeds.lock().unwrap().len(), 2);
        assert_eq!(store.open_feeds(), 0);
    }

    #[test]
    fn write_errors_propagate_verbatim() {
        let (documents, _, context) = remote_context();
        context.start().unwrap();
        documents.set_offline(true);

        let err = context.delete_book("anything").unwrap_err();
        assert_eq!(err.to_string(), "Failed to delete book. Please try again.");
    }

    #[test]
    fn failed_upload_surfaces_storage_error() {
        let (_, images, context) = remote_context();
        context.start().unwrap();
        images.set_offline(true);

        let err = context
            .add_book(
                NewBook::new("Dune", "Frank Herbert", "SF"),
                Some(ImagePayload::new("cover.png", "image/png", vec![1])),
            )
            .unwrap_err();
        assert!(matches!(err, LibraryError::Storage(_)));
    }

    #[test]
    fn validation_failure_never_reaches_store() {
        let (documents, _, context) = remote_context();
        let err = context
            .add_book(NewBook::new("", "Frank Herbert", "SF"), None)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(documents.is_empty("books"));
    }

    #[test]
    fn refresh_stats_rereads_store() {
        let store = Arc::new(DemoStore::seeded());
        let context = LibraryContext::new(store.clone() as Arc<dyn LibraryStore>, None);
        context.start().unwrap();

        store.delete_book("2").unwrap();
        // The demo feed delivered once; only a refresh sees the change.
        assert_eq!(context.stats().checked_out_books, 1);
        let stats = context.refresh_stats().unwrap();
        assert_eq!(stats.checked_out_books, 0);
        assert_eq!(context.stats(), stats);
    }

    #[test]
    fn export_uses_current_books() {
        let context = demo_context();
        context.start().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let export = context.export_books_on(date).unwrap();
        assert_eq!(export.file_name, "library-books-2024-06-01.csv");
        assert_eq!(export.contents.lines().count(), 6);
    }
}
