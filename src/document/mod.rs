//! Document database seam.
//!
//! The library never talks to a vendor SDK directly. It talks to a
//! [`DocumentStore`]: named collections of JSON documents, simple equality
//! filters, a single ordering field, server-stamped timestamps and push
//! feeds that deliver whole-collection snapshots.
//!
//! [`InMemoryDocumentStore`] implements the trait in process. It backs the
//! tests and local development, and can simulate outages.

mod in_memory;
mod store;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::error::StoreError;

pub use in_memory::InMemoryDocumentStore;
pub use store::DocumentStore;

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// A document as returned by a backend: its id plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Decodes the document into a typed record, injecting the id as `"id"`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

/// Decodes a snapshot, skipping (and logging) documents that do not fit `T`.
pub fn decode_documents<T: DeserializeOwned>(collection: &str, docs: &[Document]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode() {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(collection, id = %doc.id, error = %e, "skipping malformed document");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Collection query: equality filters, optional ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| fields.get(field) == Some(expected))
    }
}

/// Fields to write plus the fields the backend must stamp with its own clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWrite {
    pub fields: Fields,
    pub server_timestamps: Vec<String>,
}

impl DocumentWrite {
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }

    /// Serializes `value` (which must encode as a JSON object) into a write.
    pub fn from_serializable<T: serde::Serialize>(value: &T) -> Result<Self, StoreError> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self::new(fields)),
            other => Err(StoreError::Serde(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn stamp(mut self, field: impl Into<String>) -> Self {
        self.server_timestamps.push(field.into());
        self
    }
}

/// Push-feed callback: a full snapshot per change, or the feed's error.
pub type SnapshotListener = Arc<dyn Fn(Result<Vec<Document>, StoreError>) + Send + Sync>;

/// Registration id of a push feed, used to stop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);
