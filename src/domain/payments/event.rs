//! Payment webhook event types.
//!
//! Defines the envelope sent by the payment provider, the closed set of
//! event kinds we act on, and the typed objects each kind carries.
//! Only fields relevant to our processing are captured.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::subscription::SubscriptionStatus;
use super::webhook_errors::WebhookError;

/// Known payment event kinds.
///
/// Anything the provider sends that is not listed here is carried as
/// `Other` so it can be acknowledged without being acted on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A payment intent completed.
    PaymentIntentSucceeded,
    /// A payment intent attempt failed.
    PaymentIntentPaymentFailed,
    /// Customer subscription was created.
    CustomerSubscriptionCreated,
    /// Customer subscription was updated.
    CustomerSubscriptionUpdated,
    /// Customer subscription was deleted (canceled).
    CustomerSubscriptionDeleted,
    /// Invoice payment succeeded.
    InvoicePaymentSucceeded,
    /// Invoice payment failed.
    InvoicePaymentFailed,
    /// Any other event type, kept verbatim.
    Other(String),
}

impl EventKind {
    /// Parse an event kind from the provider's type string.
    pub fn parse(s: &str) -> Self {
        match s {
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentPaymentFailed,
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Convert back to the provider's type string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PaymentIntentSucceeded => "payment_intent.succeeded",
            Self::PaymentIntentPaymentFailed => "payment_intent.payment_failed",
            Self::CustomerSubscriptionCreated => "customer.subscription.created",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::Other(s) => s,
        }
    }

    /// Returns true for kinds with a registered state transition.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Event objects
// ════════════════════════════════════════════════════════════════════════════════

/// Payment intent carried by `payment_intent.*` events.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentIntentObject {
    /// Provider reference (pi_xxx).
    pub id: String,

    /// Amount captured, in the smallest currency unit.
    #[serde(default)]
    pub amount_received: i64,

    /// Free-form metadata attached at checkout; `order_id` links the order.
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Error of the last failed attempt.
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
}

/// Failure detail attached to a payment intent.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LastPaymentError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Reason recorded when the provider gives none.
pub const DEFAULT_FAILURE_REASON: &str = "Payment failed";

impl PaymentIntentObject {
    /// The order this payment belongs to, if the checkout attached one.
    pub fn order_id(&self) -> Option<&str> {
        self.metadata
            .get("order_id")
            .map(String::as_str)
            .filter(|id| !id.trim().is_empty())
    }

    /// Human-readable failure reason.
    pub fn failure_reason(&self) -> String {
        self.last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string())
    }
}

/// Subscription carried by `customer.subscription.*` events.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionObject {
    /// External subscription id (sub_xxx).
    pub id: String,

    /// External customer id (cus_xxx).
    pub customer: String,

    pub status: SubscriptionStatus,

    /// Unix seconds.
    #[serde(default)]
    pub current_period_start: Option<i64>,

    /// Unix seconds.
    #[serde(default)]
    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// Unix seconds.
    #[serde(default)]
    pub canceled_at: Option<i64>,
}

/// Invoice carried by `invoice.*` events.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InvoiceObject {
    /// Invoice id (in_xxx).
    pub id: String,

    /// External subscription id, absent for one-off invoices.
    #[serde(default)]
    pub subscription: Option<String>,

    #[serde(default)]
    pub customer: Option<String>,

    #[serde(default)]
    pub amount_paid: i64,

    #[serde(default)]
    pub attempt_count: u32,
}

/// The decoded object of an event, typed by its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    PaymentSucceeded(PaymentIntentObject),
    PaymentFailed(PaymentIntentObject),
    SubscriptionCreated(SubscriptionObject),
    SubscriptionUpdated(SubscriptionObject),
    SubscriptionDeleted(SubscriptionObject),
    InvoicePaymentSucceeded(InvoiceObject),
    InvoicePaymentFailed(InvoiceObject),
    /// Object of a kind we do not act on, kept as raw JSON.
    Unrecognized(Value),
}

impl EventPayload {
    /// Decodes `data.object` into the type the kind calls for.
    pub fn decode(kind: &EventKind, object: &Value) -> Result<Self, serde_json::Error> {
        let payload = match kind {
            EventKind::PaymentIntentSucceeded => {
                Self::PaymentSucceeded(PaymentIntentObject::deserialize(object)?)
            }
            EventKind::PaymentIntentPaymentFailed => {
                Self::PaymentFailed(PaymentIntentObject::deserialize(object)?)
            }
            EventKind::CustomerSubscriptionCreated => {
                Self::SubscriptionCreated(SubscriptionObject::deserialize(object)?)
            }
            EventKind::CustomerSubscriptionUpdated => {
                Self::SubscriptionUpdated(SubscriptionObject::deserialize(object)?)
            }
            EventKind::CustomerSubscriptionDeleted => {
                Self::SubscriptionDeleted(SubscriptionObject::deserialize(object)?)
            }
            EventKind::InvoicePaymentSucceeded => {
                Self::InvoicePaymentSucceeded(InvoiceObject::deserialize(object)?)
            }
            EventKind::InvoicePaymentFailed => {
                Self::InvoicePaymentFailed(InvoiceObject::deserialize(object)?)
            }
            EventKind::Other(_) => Self::Unrecognized(object.clone()),
        };
        Ok(payload)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Verified event
// ════════════════════════════════════════════════════════════════════════════════

/// Wire envelope: `{ id?, type, created?, livemode?, data: { object } }`.
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    created: Option<i64>,
    livemode: Option<bool>,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: Value,
}

/// An event whose signature has been checked against the shared secret.
///
/// Only the verifier constructs these; fields are read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedEvent {
    id: Option<String>,
    kind: EventKind,
    timestamp: i64,
    created: Option<i64>,
    livemode: bool,
    object: Value,
    payload: EventPayload,
}

impl VerifiedEvent {
    /// Decodes a signed body. `timestamp` is the signed `t` value.
    pub(crate) fn from_signed_body(timestamp: i64, body: &[u8]) -> Result<Self, WebhookError> {
        let envelope: EventEnvelope = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let kind = EventKind::parse(&envelope.event_type);
        let payload = EventPayload::decode(&kind, &envelope.data.object)
            .map_err(|e| WebhookError::MalformedPayload(format!("{}: {}", kind, e)))?;

        Ok(Self {
            id: envelope.id,
            kind,
            timestamp,
            created: envelope.created,
            livemode: envelope.livemode.unwrap_or(false),
            object: envelope.data.object,
            payload,
        })
    }

    /// Provider event id (evt_xxx), when the envelope carries one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// The type string exactly as the provider sent it.
    pub fn event_type(&self) -> &str {
        self.kind.as_str()
    }

    /// Signed timestamp from the signature header (Unix seconds).
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Creation time from the envelope, if present.
    pub fn created(&self) -> Option<i64> {
        self.created
    }

    /// Time used to order competing updates: envelope creation when
    /// present, otherwise the signed timestamp.
    pub fn effective_timestamp(&self) -> i64 {
        self.created.unwrap_or(self.timestamp)
    }

    pub fn is_live(&self) -> bool {
        self.livemode
    }

    /// The raw `data.object` as received.
    pub fn object(&self) -> &Value {
        &self.object
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }
}
