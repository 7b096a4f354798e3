//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `DocumentStore` - Document collections read and patched by the webhook handlers

mod document_store;

pub use document_store::{Document, DocumentStore, FieldFilter, Fields, SaveResult};
