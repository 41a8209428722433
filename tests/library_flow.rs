use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use library_sync::document::InMemoryDocumentStore;
use library_sync::storage::{InMemoryObjectStore, ObjectStore};
use library_sync::{
    BackendConfig, BackendMode, Book, BookPatch, BookStatus, LibraryConfig, LibraryContext,
    LibraryStats, NewBook, NewMember, Phase,
};

fn configured() -> LibraryConfig {
    LibraryConfig {
        backend: BackendConfig {
            api_key: "AIza-integration".into(),
            project_id: "library-integration".into(),
            ..BackendConfig::default()
        },
        ..LibraryConfig::default()
    }
}

#[test]
fn unconfigured_backend_runs_on_demo_seed() {
    let documents = Arc::new(InMemoryDocumentStore::new());
    let context = LibraryContext::connect(&LibraryConfig::default(), Some(documents), None);
    context.start().unwrap();

    assert_eq!(context.mode(), BackendMode::Demo);
    let books = context.books();
    assert_eq!(books.len(), 5);
    assert_eq!(books[0].title, "The Catcher in the Rye");
    assert_eq!(
        context.stats(),
        LibraryStats {
            total_books: 5,
            available_books: 4,
            checked_out_books: 1,
            total_members: 3,
        }
    );
}

#[test]
fn remote_session_round_trip() {
    let documents = Arc::new(InMemoryDocumentStore::new());
    let images: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new("covers"));
    let context = LibraryContext::connect(&configured(), Some(Arc::clone(&documents)), Some(images));
    context.start().unwrap();
    assert_eq!(context.phase(), Phase::Live);
    assert!(context.backend_ready());

    let diary = context
        .add_book(NewBook::new("Smith, John's Diary", "John Smith", "Memoir"), None)
        .unwrap();
    context
        .add_book(NewBook::new("The Mockingbird Returns", "Anon", "Fiction"), None)
        .unwrap();
    let member = context
        .add_member(NewMember::new("Ada Lovelace", "ada@example.com"))
        .unwrap();

    assert_eq!(context.books().len(), 2);
    assert_eq!(context.members()[0].id, member);
    assert_eq!(context.search_books("MOCK").len(), 1);

    context
        .update_book(&diary, BookPatch::status(BookStatus::CheckedOut), None)
        .unwrap();
    assert_eq!(context.stats().checked_out_books, 1);

    let export = context
        .export_books_on(NaiveDate::from_ymd_opt(2024, 5, 4).unwrap())
        .unwrap();
    let mut reader = csv::Reader::from_reader(export.contents.as_bytes());
    let titles: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[0].to_string())
        .collect();
    assert!(titles.contains(&"Smith, John's Diary".to_string()));
    assert_eq!(export.file_name, "library-books-2024-05-04.csv");

    context.delete_book(&diary).unwrap();
    context.delete_book(&diary).unwrap();
    assert_eq!(context.books().len(), 1);

    context.shutdown();
    assert_eq!(documents.feed_count(), 0);
}

#[test]
fn feed_outage_shows_demo_data_then_recovers() {
    let documents = Arc::new(InMemoryDocumentStore::new());
    let context = LibraryContext::connect(&configured(), Some(Arc::clone(&documents)), None);
    context.start().unwrap();
    context
        .add_book(NewBook::new("Dune", "Frank Herbert", "SF"), None)
        .unwrap();

    documents.fail_feeds("stream reset");
    assert_eq!(context.books().len(), 5);

    context
        .add_book(NewBook::new("Emma", "Jane Austen", "Romance"), None)
        .unwrap();
    let titles: Vec<String> = context.books().into_iter().map(|b| b.title).collect();
    assert_eq!(titles, vec!["Emma".to_string(), "Dune".to_string()]);
}

#[test]
fn closed_store_feed_stays_silent() {
    let documents = Arc::new(InMemoryDocumentStore::new());
    let store = library_sync::select_store(&configured().backend, Some(Arc::clone(&documents)));
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);
    let subscription = store.subscribe_books(Box::new(move |_books: Vec<Book>| {
        *counter.lock().unwrap() += 1;
    }));

    subscription.close();
    store
        .add_book(NewBook::new("Dune", "Frank Herbert", "SF"))
        .unwrap();
    subscription.close();

    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn writes_fail_loudly_during_outage_while_reads_degrade() {
    let documents = Arc::new(InMemoryDocumentStore::new());
    let context = LibraryContext::connect(&configured(), Some(Arc::clone(&documents)), None);
    context.start().unwrap();
    documents.set_offline(true);

    let err = context
        .add_member(NewMember::new("Ada Lovelace", "ada@example.com"))
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to add member. Please try again.");

    let stats = context.refresh_stats().unwrap();
    assert_eq!(stats.total_books, 5);
    assert_eq!(stats.total_members, 3);
}
