//! HTTP DTOs for the payment webhook endpoint.
//!
//! Response bodies are what the payment provider sees; only the status
//! code drives its retry behavior.

use serde::Serialize;

use crate::application::WebhookAck;
use crate::domain::foundation::Timestamp;

/// Body returned when an event was accepted (including unknown kinds).
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub success: bool,
    /// Event type exactly as received.
    pub event_type: String,
    pub processed_at: Timestamp,
}

impl From<WebhookAck> for WebhookAckResponse {
    fn from(ack: WebhookAck) -> Self {
        Self {
            success: true,
            event_type: ack.event_type,
            processed_at: ack.processed_at,
        }
    }
}

/// Body returned on rejection or processing failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Human-readable error message.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
