use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Receives a full collection snapshot.
pub type SnapshotCallback<R> = Box<dyn Fn(Vec<R>) + Send + Sync>;

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle to an open feed.
///
/// `close` flips the shared active flag before unregistering the backend
/// feed. Deliveries that start after that are dropped by the sink; one that
/// already passed the check still runs to completion, so receivers that
/// must ignore late snapshots keep their own guard.
pub struct Subscription {
    active: Arc<AtomicBool>,
    teardown: Mutex<Option<Teardown>>,
}

impl Subscription {
    pub(crate) fn new(active: Arc<AtomicBool>, teardown: Option<Teardown>) -> Self {
        Self {
            active,
            teardown: Mutex::new(teardown),
        }
    }

    /// A handle with nothing to tear down.
    pub fn noop() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)), None)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stops delivery. Idempotent.
    pub fn close(&self) {
        self.active.store(false, Ordering::SeqCst);
        let teardown = match self.teardown.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(teardown) = teardown {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Delivery side of a subscription: forwards snapshots while active.
pub struct SnapshotSink<R> {
    active: Arc<AtomicBool>,
    callback: Arc<dyn Fn(Vec<R>) + Send + Sync>,
}

impl<R> Clone for SnapshotSink<R> {
    fn clone(&self) -> Self {
        Self {
            active: Arc::clone(&self.active),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<R> SnapshotSink<R> {
    pub fn new(active: Arc<AtomicBool>, callback: SnapshotCallback<R>) -> Self {
        Self {
            active,
            callback: Arc::from(callback),
        }
    }

    /// Forwards `snapshot` unless the subscription was closed. Returns
    /// whether the callback ran. The flag is read once, before the callback.
    pub fn deliver(&self, snapshot: Vec<R>) -> bool {
        if !self.active.load(Ordering::SeqCst) {
            return false;
        }
        (self.callback)(snapshot);
        true
    }
}
