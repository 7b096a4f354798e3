//! DocumentStore port - Interface for the document persistence collaborator.
//!
//! The payment handlers only ever read a document, search by one field,
//! create a document under a chosen id, or merge a partial patch into an
//! existing one. Anything richer belongs to the hosting platform.
//!
//! ## Conflicts
//!
//! `create` reports an existing id as `SaveResult::AlreadyExists` rather
//! than an error so concurrent deliveries of the same "created" event
//! resolve to a single document.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::foundation::DomainError;

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// A stored document and its id.
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
}

/// Equality filter over a single top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    /// Matches documents whose `field` equals `value`.
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns true if the fields satisfy this filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        fields.get(&self.field) == Some(&self.value)
    }
}

/// Result of attempting to create a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Document was inserted.
    Inserted,
    /// A document with this id already exists; nothing was written.
    AlreadyExists,
}

/// Port for reading and patching documents grouped in collections.
///
/// Implementations must apply `update` as a merge: fields absent from the
/// patch keep their stored values.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id. Returns `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, DomainError>;

    /// List documents matching the filter.
    async fn list(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<Document>, DomainError>;

    /// Create a document under the given id.
    async fn create(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<SaveResult, DomainError>;

    /// Merge `patch` into an existing document.
    ///
    /// # Errors
    ///
    /// Returns `ErrorCode::NotFound` if no document has this id.
    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<(), DomainError>;
}
