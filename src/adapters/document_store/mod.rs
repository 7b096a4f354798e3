//! DocumentStore adapters.
//!
//! - `InMemoryDocumentStore` - Process-local collections for development and tests
//! - `PostgresDocumentStore` - JSONB documents in PostgreSQL

mod in_memory;
mod postgres;

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
