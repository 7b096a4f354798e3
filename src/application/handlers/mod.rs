//! Application handlers.
//!
//! Command handlers that orchestrate domain operations.

pub mod payments;

pub use payments::{
    Collections, EventRouter, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
    TransitionOutcome, WebhookAck,
};
