//! CSV export of the book collection.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::error::LibraryError;
use crate::model::Book;

pub const EXPORT_HEADERS: [&str; 5] = ["Title", "Author", "Category", "Status", "Added Date"];

/// A generated CSV document and the file name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookExport {
    pub file_name: String,
    pub contents: String,
}

impl BookExport {
    /// Writes the export into `dir` and returns the file path.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, LibraryError> {
        let path = dir.as_ref().join(&self.file_name);
        fs::write(&path, self.contents.as_bytes())
            .map_err(|e| LibraryError::Export(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), bytes = self.contents.len(), "wrote book export");
        Ok(path)
    }
}

/// `library-books-<YYYY-MM-DD>.csv`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("library-books-{}.csv", date.format("%Y-%m-%d"))
}

/// Serializes books to comma-separated text, one row per book after the
/// header. Fields containing commas, quotes or newlines are quoted.
pub fn books_to_csv(books: &[Book]) -> Result<String, LibraryError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(EXPORT_HEADERS)?;
    for book in books {
        let added = book.added_at.date_naive().format("%Y-%m-%d").to_string();
        writer.write_record([
            book.title.as_str(),
            book.author.as_str(),
            book.category.as_str(),
            book.status.as_str(),
            added.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| LibraryError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| LibraryError::Export(e.to_string()))
}

pub fn export_books(books: &[Book], date: NaiveDate) -> Result<BookExport, LibraryError> {
    Ok(BookExport {
        file_name: export_file_name(date),
        contents: books_to_csv(books)?,
    })
}
