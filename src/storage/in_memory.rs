use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use super::{ImagePayload, ObjectStore};
use crate::error::StoreError;

/// In-memory object store. URLs have the form `memory://{bucket}/{key}`.
#[derive(Clone)]
pub struct InMemoryObjectStore {
    bucket: String,
    objects: Arc<RwLock<HashMap<String, ImagePayload>>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<ImagePayload> {
        self.objects.read().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn url_for(&self, key: &str) -> String {
        format!("memory://{}/{}", self.bucket, key)
    }

    fn key_for<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix("memory://")?
            .strip_prefix(self.bucket.as_str())?
            .strip_prefix('/')
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("object store is offline".into()))
        } else {
            Ok(())
        }
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn upload(&self, key: &str, image: &ImagePayload) -> Result<String, StoreError> {
        self.ensure_online()?;
        self.objects
            .write()
            .map_err(|_| StoreError::Backend("object store lock poisoned".into()))?
            .insert(key.to_string(), image.clone());
        Ok(self.url_for(key))
    }

    fn delete(&self, url: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        let key = self
            .key_for(url)
            .ok_or_else(|| StoreError::Backend(format!("not an object url: {}", url)))?;
        let removed = self
            .objects
            .write()
            .map_err(|_| StoreError::Backend("object store lock poisoned".into()))?
            .remove(key);
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                collection: self.bucket.clone(),
                id: key.to_string(),
            }),
        }
    }
}
