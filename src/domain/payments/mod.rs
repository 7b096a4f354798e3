//! Payments domain - webhook verification and order/subscription state.
//!
//! # Module Organization
//!
//! - `event` - Event kinds, typed payload objects, verified event
//! - `order` - Order payment state and its transitions
//! - `subscription` - Subscription lifecycle and its transitions
//! - `transition` - Outcome of evaluating an event against a record
//! - `webhook_errors` - Error types for webhook processing
//! - `webhook_verifier` - Signature verification

mod event;
mod order;
mod subscription;
mod transition;
mod webhook_errors;
mod webhook_verifier;

pub use event::{
    EventKind, EventPayload, InvoiceObject, LastPaymentError, PaymentIntentObject,
    SubscriptionObject, VerifiedEvent, DEFAULT_FAILURE_REASON,
};
pub use order::{Order, OrderPatch, OrderStatus};
pub use subscription::{Subscription, SubscriptionPatch, SubscriptionStatus, EXTERNAL_ID_FIELD};
pub use transition::Transition;
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{
    compute_signature, signature_header, SignatureHeader, WebhookVerifier, DEFAULT_TOLERANCE_SECS,
};
