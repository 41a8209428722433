use super::ImagePayload;
use crate::error::StoreError;

/// Blob storage used for record images.
pub trait ObjectStore: Send + Sync {
    /// Stores `image` under `key` and returns a URL that retrieves it.
    fn upload(&self, key: &str, image: &ImagePayload) -> Result<String, StoreError>;

    /// Deletes the object behind a URL previously returned by `upload`.
    fn delete(&self, url: &str) -> Result<(), StoreError>;
}
