//! Foundation module - Shared domain primitives.

mod errors;
mod timestamp;

pub use errors::{DomainError, ErrorCode};
pub use timestamp::Timestamp;
