use std::sync::Arc;

use tracing::{error, warn};

use super::{BackendMode, DemoStore, LibraryStore};
use crate::document::{decode_documents, Direction, DocumentStore, DocumentWrite, Query};
use crate::error::{LibraryError, StoreError};
use crate::live::{watch_collection, SnapshotCallback, Subscription};
use crate::model::{
    Book, BookPatch, BookStatus, Member, MemberPatch, NewBook, NewMember, Record,
};

const BOOK_UPDATED_FIELD: &str = "updatedAt";

const ADD_BOOK_FAILED: &str = "Failed to add book. Please check your connection and try again.";
const UPDATE_BOOK_FAILED: &str = "Failed to update book. Please try again.";
const DELETE_BOOK_FAILED: &str = "Failed to delete book. Please try again.";
const ADD_MEMBER_FAILED: &str = "Failed to add member. Please try again.";
const UPDATE_MEMBER_FAILED: &str = "Failed to update member. Please try again.";
const DELETE_MEMBER_FAILED: &str = "Failed to delete member. Please try again.";

fn newest_first<R: Record>() -> Query {
    Query::collection(R::COLLECTION).order_by(R::CREATED_FIELD, Direction::Descending)
}

/// Library store backed by a document database.
///
/// Failed reads log a warning and answer from the fallback [`DemoStore`].
/// Failed writes log an error and return [`LibraryError::Write`] with a
/// message fit for the user; they never fall back.
pub struct RemoteStore<D: ?Sized> {
    documents: Arc<D>,
    fallback: DemoStore,
}

impl<D: DocumentStore + ?Sized + 'static> RemoteStore<D> {
    pub fn new(documents: Arc<D>) -> Self {
        Self::with_fallback(documents, DemoStore::seeded())
    }

    pub fn with_fallback(documents: Arc<D>, fallback: DemoStore) -> Self {
        Self {
            documents,
            fallback,
        }
    }

    fn read<R: Record>(&self, query: Query, fallback: impl FnOnce(&DemoStore) -> Vec<R>) -> Vec<R> {
        match self.documents.query(&query) {
            Ok(docs) => decode_documents(R::COLLECTION, &docs),
            Err(e) => {
                warn!(
                    collection = R::COLLECTION,
                    error = %e,
                    "read failed, answering with demo data"
                );
                fallback(&self.fallback)
            }
        }
    }

    fn write<T>(
        &self,
        operation: &'static str,
        message: &'static str,
        result: Result<T, StoreError>,
    ) -> Result<T, LibraryError> {
        result.map_err(|e| {
            error!(operation, error = %e, "backend write failed");
            LibraryError::write(operation, message)
        })
    }
}

impl<D: DocumentStore + ?Sized + 'static> LibraryStore for RemoteStore<D> {
    fn mode(&self) -> BackendMode {
        BackendMode::Remote
    }

    fn all_books(&self) -> Vec<Book> {
        self.read(newest_first::<Book>(), |demo| demo.all_books())
    }

    fn recent_books(&self, limit: usize) -> Vec<Book> {
        self.read(newest_first::<Book>().limit(limit), |demo| {
            demo.recent_books(limit)
        })
    }

    fn add_book(&self, book: NewBook) -> Result<String, LibraryError> {
        book.validate()?;
        let result = DocumentWrite::from_serializable(&book).and_then(|write| {
            let write = write.stamp(Book::CREATED_FIELD).stamp(BOOK_UPDATED_FIELD);
            self.documents.add(Book::COLLECTION, write)
        });
        self.write("add_book", ADD_BOOK_FAILED, result)
    }

    fn update_book(&self, id: &str, patch: BookPatch) -> Result<(), LibraryError> {
        patch.validate()?;
        let result = DocumentWrite::from_serializable(&patch).and_then(|write| {
            self.documents
                .update(Book::COLLECTION, id, write.stamp(BOOK_UPDATED_FIELD))
        });
        self.write("update_book", UPDATE_BOOK_FAILED, result)
    }

    fn delete_book(&self, id: &str) -> Result<(), LibraryError> {
        let result = self.documents.delete(Book::COLLECTION, id);
        self.write("delete_book", DELETE_BOOK_FAILED, result)
    }

    // The backend has no full-text search: fetch everything, filter here.
    fn search_books(&self, term: &str) -> Vec<Book> {
        self.all_books()
            .into_iter()
            .filter(|book| book.matches(term))
            .collect()
    }

    fn books_by_category(&self, category: &str) -> Vec<Book> {
        self.read(
            newest_first::<Book>().where_eq("category", category),
            |demo| demo.books_by_category(category),
        )
    }

    fn books_by_status(&self, status: BookStatus) -> Vec<Book> {
        self.read(
            newest_first::<Book>().where_eq("status", status.as_str()),
            |demo| demo.books_by_status(status),
        )
    }

    fn all_members(&self) -> Vec<Member> {
        self.read(newest_first::<Member>(), |demo| demo.all_members())
    }

    fn add_member(&self, member: NewMember) -> Result<String, LibraryError> {
        member.validate()?;
        let result = DocumentWrite::from_serializable(&member).and_then(|write| {
            self.documents
                .add(Member::COLLECTION, write.stamp(Member::CREATED_FIELD))
        });
        self.write("add_member", ADD_MEMBER_FAILED, result)
    }

    fn update_member(&self, id: &str, patch: MemberPatch) -> Result<(), LibraryError> {
        patch.validate()?;
        let result = DocumentWrite::from_serializable(&patch)
            .and_then(|write| self.documents.update(Member::COLLECTION, id, write));
        self.write("update_member", UPDATE_MEMBER_FAILED, result)
    }

    fn delete_member(&self, id: &str) -> Result<(), LibraryError> {
        let result = self.documents.delete(Member::COLLECTION, id);
        self.write("delete_member", DELETE_MEMBER_FAILED, result)
    }

    fn subscribe_books(&self, callback: SnapshotCallback<Book>) -> Subscription {
        watch_collection(
            &self.documents,
            newest_first::<Book>(),
            self.fallback.all_books(),
            callback,
        )
    }

    fn subscribe_members(&self, callback: SnapshotCallback<Member>) -> Subscription {
        watch_collection(
            &self.documents,
            newest_first::<Member>(),
            self.fallback.all_members(),
            callback,
        )
    }
}
