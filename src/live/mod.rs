//! Live snapshot feeds.
//!
//! A feed pushes the entire collection, newest first, on every change. The
//! caller gets back a [`Subscription`]; closing it (explicitly or by drop)
//! stops delivery and unregisters the backend feed. Closing twice is fine.
//!
//! Two feed shapes exist:
//!
//! - [`deliver_once`]: the demo path. The callback runs exactly once with
//!   the demo snapshot and the returned handle is already closed.
//! - [`watch_collection`]: the remote path. Backend snapshots are decoded
//!   and forwarded; a backend feed error is answered with the demo
//!   snapshot while the feed stays open.

mod feed;
mod subscription;

pub use feed::{deliver_once, watch_collection};
pub use subscription::{SnapshotCallback, SnapshotSink, Subscription};
