//! HTTP adapter for payment webhooks.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, HealthResponse, WebhookAckResponse};
pub use handlers::{
    handle_stripe_webhook, health, panic_response, WebhookApiError, WebhookAppState,
    SIGNATURE_HEADER,
};
pub use routes::{payment_router, webhook_routes};
