//! HTTP adapters - REST API implementations.

pub mod webhook;

pub use webhook::{payment_router, WebhookAppState};
