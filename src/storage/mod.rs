//! Object storage seam for book covers and member avatars.
//!
//! Objects are keyed `{collection}/{entity_id}/{file_name}`; an upload
//! returns a URL that can be stored on the record.

mod in_memory;
mod store;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::error;

use crate::error::{LibraryError, StoreError};

pub use in_memory::InMemoryObjectStore;
pub use store::ObjectStore;

/// An uploaded image as received from a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Builds a payload from base64 text, the encoding browsers use for file inputs.
    pub fn from_base64(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        encoded: &str,
    ) -> Result<Self, LibraryError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| LibraryError::Validation(format!("invalid image encoding: {}", e)))?;
        Ok(Self::new(file_name, content_type, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn object_key(collection: &str, entity_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", collection, entity_id, file_name)
}

pub fn upload_book_image(
    store: &dyn ObjectStore,
    image: &ImagePayload,
    book_id: &str,
) -> Result<String, LibraryError> {
    upload(store, image, &object_key("books", book_id, &image.file_name))
}

pub fn upload_member_avatar(
    store: &dyn ObjectStore,
    image: &ImagePayload,
    member_id: &str,
) -> Result<String, LibraryError> {
    upload(store, image, &object_key("members", member_id, &image.file_name))
}

pub fn delete_image(store: &dyn ObjectStore, url: &str) -> Result<(), LibraryError> {
    store.delete(url).map_err(|e| {
        error!(url, error = %e, "failed to delete image");
        LibraryError::Storage(e.to_string())
    })
}

fn upload(store: &dyn ObjectStore, image: &ImagePayload, key: &str) -> Result<String, LibraryError> {
    store.upload(key, image).map_err(|e: StoreError| {
        error!(key, error = %e, "failed to upload image");
        LibraryError::Storage(e.to_string())
    })
}
