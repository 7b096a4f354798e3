//! HTTP handlers for the payment webhook endpoint.

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::application::{
    Collections, EventRouter, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
};
use crate::domain::payments::{WebhookError, WebhookVerifier};
use crate::ports::DocumentStore;

use super::dto::{ErrorResponse, HealthResponse, WebhookAckResponse};

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request; dependencies are Arc-wrapped.
#[derive(Clone)]
pub struct WebhookAppState {
    pub verifier: Arc<WebhookVerifier>,
    pub store: Arc<dyn DocumentStore>,
    pub collections: Collections,
}

impl WebhookAppState {
    pub fn new(
        verifier: WebhookVerifier,
        store: Arc<dyn DocumentStore>,
        collections: Collections,
    ) -> Self {
        Self {
            verifier: Arc::new(verifier),
            store,
            collections,
        }
    }

    /// Create the handler on demand from the shared state.
    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            self.verifier.clone(),
            EventRouter::new(self.store.clone(), self.collections.clone()),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/stripe - Handle payment webhook events
pub async fn handle_stripe_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAckResponse>, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    let ack = state.webhook_handler().handle(cmd).await?;

    Ok(Json(ack.into()))
}

/// GET /health - Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts webhook errors to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(self.0.to_string());
        (self.0.status_code(), Json(body)).into_response()
    }
}

/// Renders a panic inside a handler as the JSON 500 body.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!(panic = detail, "Webhook handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use crate::domain::foundation::{DomainError, ErrorCode};
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // Error Mapping Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn invalid_signature_maps_to_400() {
        let response = WebhookApiError::from(WebhookError::InvalidSignature).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": "Invalid signature"})
        );
    }

    #[tokio::test]
    async fn persistence_failure_maps_to_500() {
        let err: WebhookError = DomainError::new(ErrorCode::DatabaseError, "down").into();

        let response = WebhookApiError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().starts_with("Persistence failure"));
    }

    #[tokio::test]
    async fn panic_renders_json_500() {
        let response = panic_response(Box::new("boom"));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": "Internal server error"})
        );
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health().await;

        assert_eq!(body.status, "ok");
    }
}
