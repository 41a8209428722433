use thiserror::Error;

/// Errors surfaced to callers of the library store and the context.
///
/// Backend outages on reads never show up here: reads fall back to the demo
/// dataset. Writes and validation always do.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    /// Required fields missing; raised before any backend call.
    #[error("{0}")]
    Validation(String),
    /// A backend write failed. `message` is meant to be shown to the user.
    #[error("{message}")]
    Write {
        operation: &'static str,
        message: String,
    },
    /// Uploading or deleting an image failed.
    #[error("image storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("export error: {0}")]
    Export(String),
    #[error("library state lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl LibraryError {
    pub(crate) fn write(operation: &'static str, message: &str) -> Self {
        LibraryError::Write {
            operation,
            message: message.to_string(),
        }
    }

    /// True for errors raised before the backend was contacted.
    pub fn is_validation(&self) -> bool {
        matches!(self, LibraryError::Validation(_))
    }
}

/// Errors raised by the document and object backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("document serialization error: {0}")]
    Serde(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}

impl From<config::ConfigError> for LibraryError {
    fn from(err: config::ConfigError) -> Self {
        LibraryError::Config(err.to_string())
    }
}

impl From<csv::Error> for LibraryError {
    fn from(err: csv::Error) -> Self {
        LibraryError::Export(err.to_string())
    }
}
