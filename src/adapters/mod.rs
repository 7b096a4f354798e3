//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `document_store` - DocumentStore implementations (in-memory, PostgreSQL)
//! - `http` - Axum routes for the webhook endpoint

pub mod document_store;
pub mod http;

pub use document_store::{InMemoryDocumentStore, PostgresDocumentStore};
