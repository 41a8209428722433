use std::sync::{PoisonError, RwLock};

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use super::{BackendMode, LibraryStore};
use crate::error::LibraryError;
use crate::live::{deliver_once, SnapshotCallback, Subscription};
use crate::model::{
    sort_newest_first, Book, BookPatch, BookStatus, Member, MemberPatch, NewBook, NewMember,
    Timestamp,
};

fn day(year: i32, month: u32, day: u32) -> Timestamp {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn seed_book(
    id: &str,
    title: &str,
    author: &str,
    category: &str,
    status: BookStatus,
    added: Timestamp,
) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        category: category.to_string(),
        status,
        image_url: None,
        added_at: added,
        updated_at: added,
    }
}

/// The five demo books, newest first.
pub fn demo_books() -> Vec<Book> {
    let mut books = vec![
        seed_book("1", "The Catcher in the Rye", "J.D. Salinger", "Fiction", BookStatus::Available, day(2024, 1, 15)),
        seed_book("2", "To Kill a Mockingbird", "Harper Lee", "Fiction", BookStatus::CheckedOut, day(2024, 1, 10)),
        seed_book("3", "1984", "George Orwell", "Dystopian", BookStatus::Available, day(2024, 1, 12)),
        seed_book("4", "Pride and Prejudice", "Jane Austen", "Romance", BookStatus::Available, day(2024, 1, 8)),
        seed_book("5", "The Great Gatsby", "F. Scott Fitzgerald", "Fiction", BookStatus::Available, day(2024, 1, 5)),
    ];
    sort_newest_first(&mut books);
    books
}

/// The three demo members, most recently joined first.
pub fn demo_members() -> Vec<Member> {
    let member = |id: &str, name: &str, email: &str, joined: Timestamp, out: u32| Member {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        joined_at: joined,
        books_checked_out: out,
        is_active: true,
    };
    let mut members = vec![
        member("1", "John Doe", "john@example.com", day(2024, 1, 1), 1),
        member("2", "Jane Smith", "jane@example.com", day(2024, 1, 5), 0),
        member("3", "Bob Johnson", "bob@example.com", day(2024, 1, 3), 0),
    ];
    sort_newest_first(&mut members);
    members
}

/// In-memory library used when no backend is reachable.
///
/// Each instance owns its own copy of the data, so tests can run isolated
/// stores side by side. New records get a random id and the local clock;
/// updates merge fields without touching timestamps.
pub struct DemoStore {
    books: RwLock<Vec<Book>>,
    members: RwLock<Vec<Member>>,
}

impl Default for DemoStore {
    fn default() -> Self {
        Self::seeded()
    }
}

impl DemoStore {
    pub fn seeded() -> Self {
        Self::with_data(demo_books(), demo_members())
    }

    pub fn with_data(mut books: Vec<Book>, mut members: Vec<Member>) -> Self {
        sort_newest_first(&mut books);
        sort_newest_first(&mut members);
        Self {
            books: RwLock::new(books),
            members: RwLock::new(members),
        }
    }

    fn books(&self) -> Vec<Book> {
        self.books
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn members(&self) -> Vec<Member> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn filter_books(&self, keep: impl Fn(&Book) -> bool) -> Vec<Book> {
        self.books
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|book| keep(book))
            .cloned()
            .collect()
    }
}

impl LibraryStore for DemoStore {
    fn mode(&self) -> BackendMode {
        BackendMode::Demo
    }

    fn all_books(&self) -> Vec<Book> {
        self.books()
    }

    fn recent_books(&self, limit: usize) -> Vec<Book> {
        let mut books = self.books();
        books.truncate(limit);
        books
    }

    fn add_book(&self, book: NewBook) -> Result<String, LibraryError> {
        book.validate()?;
        let id = Uuid::new_v4().simple().to_string();
        let book = book.into_book(id.clone(), Utc::now());
        self.books
            .write()
            .map_err(|_| LibraryError::LockPoisoned("demo add_book"))?
            .insert(0, book);
        Ok(id)
    }

    fn update_book(&self, id: &str, patch: BookPatch) -> Result<(), LibraryError> {
        patch.validate()?;
        let mut books = self
            .books
            .write()
            .map_err(|_| LibraryError::LockPoisoned("demo update_book"))?;
        if let Some(book) = books.iter_mut().find(|book| book.id == id) {
            patch.apply_to(book);
        }
        Ok(())
    }

    fn delete_book(&self, id: &str) -> Result<(), LibraryError> {
        let mut books = self
            .books
            .write()
            .map_err(|_| LibraryError::LockPoisoned("demo delete_book"))?;
        if let Some(index) = books.iter().position(|book| book.id == id) {
            books.remove(index);
        }
        Ok(())
    }

    fn search_books(&self, term: &str) -> Vec<Book> {
        self.filter_books(|book| book.matches(term))
    }

    fn books_by_category(&self, category: &str) -> Vec<Book> {
        self.filter_books(|book| book.category == category)
    }

    fn books_by_status(&self, status: BookStatus) -> Vec<Book> {
        self.filter_books(|book| book.status == status)
    }

    fn all_members(&self) -> Vec<Member> {
        self.members()
    }

    fn add_member(&self, member: NewMember) -> Result<String, LibraryError> {
        member.validate()?;
        let id = Uuid::new_v4().simple().to_string();
        let member = member.into_member(id.clone(), Utc::now());
        self.members
            .write()
            .map_err(|_| LibraryError::LockPoisoned("demo add_member"))?
            .insert(0, member);
        Ok(id)
    }

    fn update_member(&self, id: &str, patch: MemberPatch) -> Result<(), LibraryError> {
        patch.validate()?;
        let mut members = self
            .members
            .write()
            .map_err(|_| LibraryError::LockPoisoned("demo update_member"))?;
        if let Some(member) = members.iter_mut().find(|member| member.id == id) {
            patch.apply_to(member);
        }
        Ok(())
    }

    fn delete_member(&self, id: &str) -> Result<(), LibraryError> {
        let mut members = self
            .members
            .write()
            .map_err(|_| LibraryError::LockPoisoned("demo delete_member"))?;
        if let Some(index) = members.iter().position(|member| member.id == id) {
            members.remove(index);
        }
        Ok(())
    }

    fn subscribe_books(&self, callback: SnapshotCallback<Book>) -> Subscription {
        deliver_once(self.books(), callback)
    }

    fn subscribe_members(&self, callback: SnapshotCallback<Member>) -> Subscription {
        deliver_once(self.members(), callback)
    }
}
