//! HandlePaymentWebhookHandler - Command handler for processing payment provider webhooks.

use std::sync::Arc;

use tracing::{error, warn};

use crate::domain::foundation::Timestamp;
use crate::domain::payments::{WebhookError, WebhookVerifier};

use super::event_router::{EventRouter, TransitionOutcome};

/// Command to handle a payment webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw webhook payload, exactly as received.
    pub payload: Vec<u8>,
    /// Webhook signature header, if the request carried one.
    pub signature: Option<String>,
}

/// Acknowledgement of a processed webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookAck {
    pub event_type: String,
    pub event_id: Option<String>,
    pub outcome: TransitionOutcome,
    pub processed_at: Timestamp,
}

/// Handler for processing payment provider webhooks.
///
/// Verifies the signature, then routes the trusted event to its
/// state transition.
pub struct HandlePaymentWebhookHandler {
    verifier: Arc<WebhookVerifier>,
    router: EventRouter,
}

impl HandlePaymentWebhookHandler {
    pub fn new(verifier: Arc<WebhookVerifier>, router: EventRouter) -> Self {
        Self { verifier, router }
    }

    pub async fn handle(&self, cmd: HandlePaymentWebhookCommand) -> Result<WebhookAck, WebhookError> {
        // 1. Verify webhook signature and parse event
        let signature = cmd.signature.as_deref().ok_or_else(|| {
            WebhookError::MalformedHeader("missing signature header".to_string())
        })?;

        let event = self
            .verifier
            .verify(signature, &cmd.payload)
            .map_err(|e| {
                warn!(error = %e, "Rejected webhook");
                e
            })?;

        // 2. Apply the transition for its kind
        let outcome = self.router.dispatch(&event).await.map_err(|e| {
            error!(event_type = %event.event_type(), error = %e, "Webhook processing failed");
            e
        })?;

        Ok(WebhookAck {
            event_type: event.event_type().to_string(),
            event_id: event.id().map(str::to_string),
            outcome,
            processed_at: Timestamp::now(),
        })
    }
}
