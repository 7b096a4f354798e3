//! Payment webhook handlers.
//!
//! - `HandlePaymentWebhookHandler` - Verify, then route a raw webhook
//! - `EventRouter` - Select the state transition for a verified event

mod event_router;
mod handle_payment_webhook;
mod order_events;
mod subscription_events;

pub use event_router::{Collections, EventRouter, TransitionOutcome};
pub use handle_payment_webhook::{HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, WebhookAck};
