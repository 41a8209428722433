// Lets `#[derive(Record)]` expand to `library_sync::...` paths inside this crate too.
extern crate self as library_sync;

mod adapter;
mod config;
mod context;
mod error;
mod export;
mod model;
mod stats;

pub mod document;
pub mod live;
pub mod storage;
pub mod telemetry;

pub use adapter::{demo_books, demo_members, select_store, BackendMode, DemoStore, LibraryStore, RemoteStore};
pub use crate::config::{BackendConfig, LibraryConfig};
pub use context::{LibraryContext, Phase};
pub use error::{LibraryError, StoreError};
pub use export::{books_to_csv, export_books, export_file_name, BookExport, EXPORT_HEADERS};
pub use model::{
    sort_newest_first, Book, BookPatch, BookStatus, Member, MemberPatch, NewBook, NewMember,
    Record, Timestamp,
};
pub use stats::{compute_stats, LibraryStats};

// Derive macro for `Record`
pub use library_sync_macros::Record;
