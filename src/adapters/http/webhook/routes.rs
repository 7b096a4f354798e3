//! Axum router configuration for the payment webhook service.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{handle_stripe_webhook, health, panic_response, WebhookAppState};

/// Create the Stripe webhook router.
///
/// Webhooks don't carry user authentication; they are verified via signature.
///
/// # Routes
/// - `POST /stripe` - Handle Stripe webhooks
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the complete service router.
///
/// # Routes
/// - `POST /webhooks/stripe` - Signed payment events
/// - `GET /health` - Liveness probe
///
/// Panics in handlers are answered with the JSON 500 body.
pub fn payment_router(state: WebhookAppState) -> Router {
    Router::new()
        .nest("/webhooks", webhook_routes())
        .route("/health", get(health))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
