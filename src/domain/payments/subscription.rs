//! Subscription record mirrored from the payment provider.
//!
//! The provider only knows its own subscription id, so records are located
//! by `stripe_subscription_id`. The document id is derived from that same
//! external id, which makes a second create for the same subscription
//! collide in the store instead of producing a duplicate.
//!
//! ## Ordering
//!
//! Lifecycle events (`customer.subscription.*`) and invoice events move
//! separate watermarks, `last_event_at` and `last_payment_event_at`. An
//! event is only stale against its own group. `status` is written by both
//! groups, so an event leaves it alone when the other group has already
//! applied a newer one.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::foundation::Timestamp;

use super::event::{InvoiceObject, SubscriptionObject};
use super::order::null_as_default;
use super::transition::Transition;

/// Field holding the external subscription id.
pub const EXTERNAL_ID_FIELD: &str = "stripe_subscription_id";

/// Namespace for subscription document ids.
const SUBSCRIPTION_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_3c2a_9b4e_4f7a_8c15_2e0d_7a9b_41c3);

/// Provider-side subscription status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionStatus {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
    /// A status this build does not know yet, kept verbatim.
    Unknown(String),
}

impl SubscriptionStatus {
    /// Parse the provider's status string.
    pub fn parse(s: &str) -> Self {
        match s {
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
            Self::Unknown(s) => s,
        }
    }

    /// Statuses a successful invoice payment brings back to active.
    fn recovers_on_payment(&self) -> bool {
        matches!(self, Self::PastDue | Self::Unpaid | Self::Incomplete)
    }
}

impl From<String> for SubscriptionStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<SubscriptionStatus> for String {
    fn from(status: SubscriptionStatus) -> Self {
        match status {
            SubscriptionStatus::Unknown(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(skip)]
    pub id: String,

    #[serde(rename = "stripe_subscription_id")]
    pub external_subscription_id: String,

    #[serde(rename = "stripe_customer_id")]
    pub customer_reference_id: String,

    pub status: SubscriptionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_period_start: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<Timestamp>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub cancel_at_period_end: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<Timestamp>,

    /// Time of the newest lifecycle event applied to this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<Timestamp>,

    /// Time of the newest invoice event applied to this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_payment_event_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_payment_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_payment_failed_at: Option<Timestamp>,
}

/// Partial update of a subscription. Unset fields are not written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubscriptionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_start: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_at_period_end: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_event_at: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_at: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_failed_at: Option<Timestamp>,
}

impl SubscriptionPatch {
    /// Serializes only the fields that are set.
    pub fn into_fields(self) -> Result<Map<String, Value>, serde_json::Error> {
        to_fields(&self)
    }
}

fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn unix(secs: Option<i64>) -> Option<Timestamp> {
    secs.and_then(Timestamp::from_unix_secs)
}

/// True if `watermark` records an event newer than `event_at`.
fn passed(watermark: Option<Timestamp>, event_at: &Timestamp) -> bool {
    watermark
        .map(|last| event_at.is_before(&last))
        .unwrap_or(false)
}

impl Subscription {
    /// Deterministic document id for an external subscription id.
    pub fn document_id_for(external_subscription_id: &str) -> String {
        Uuid::new_v5(&SUBSCRIPTION_ID_NAMESPACE, external_subscription_id.as_bytes()).to_string()
    }

    /// Builds the record for a newly created provider subscription.
    pub fn from_created_event(
        object: &SubscriptionObject,
        event_at: Timestamp,
        now: Timestamp,
    ) -> Self {
        Self {
            id: Self::document_id_for(&object.id),
            external_subscription_id: object.id.clone(),
            customer_reference_id: object.customer.clone(),
            status: object.status.clone(),
            current_period_start: unix(object.current_period_start),
            current_period_end: unix(object.current_period_end),
            cancel_at_period_end: object.cancel_at_period_end,
            created_at: Some(now),
            updated_at: None,
            canceled_at: unix(object.canceled_at),
            last_event_at: Some(event_at),
            last_payment_event_at: None,
            last_payment_at: None,
            last_payment_failed_at: None,
        }
    }

    /// Decodes a subscription from its stored fields.
    pub fn from_fields(
        id: impl Into<String>,
        fields: &Map<String, Value>,
    ) -> Result<Self, serde_json::Error> {
        let mut subscription: Subscription = serde_json::from_value(Value::Object(fields.clone()))?;
        subscription.id = id.into();
        Ok(subscription)
    }

    /// Serializes the record for creation.
    pub fn to_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        to_fields(self)
    }

    /// True if a newer lifecycle event has already been applied.
    pub fn lifecycle_passed(&self, event_at: &Timestamp) -> bool {
        passed(self.last_event_at, event_at)
    }

    /// True if a newer invoice event has already been applied.
    pub fn payment_passed(&self, event_at: &Timestamp) -> bool {
        passed(self.last_payment_event_at, event_at)
    }

    /// Transition for `customer.subscription.updated`.
    ///
    /// Period bounds always follow the newest lifecycle event. The status is
    /// kept when the record is canceled or a newer invoice event set it.
    pub fn apply_update(
        &self,
        object: &SubscriptionObject,
        event_at: Timestamp,
        now: Timestamp,
    ) -> Transition<SubscriptionPatch> {
        if self.lifecycle_passed(&event_at) {
            return Transition::Superseded("a newer subscription event was already applied");
        }

        let current_period_start = unix(object.current_period_start);
        let current_period_end = unix(object.current_period_end);

        let status = (self.status != SubscriptionStatus::Canceled
            && !self.payment_passed(&event_at)
            && self.status != object.status)
            .then(|| object.status.clone());

        let unchanged = status.is_none()
            && self.cancel_at_period_end == object.cancel_at_period_end
            && (current_period_start.is_none() || current_period_start == self.current_period_start)
            && (current_period_end.is_none() || current_period_end == self.current_period_end);
        if unchanged {
            return Transition::AlreadyApplied;
        }

        Transition::Apply(SubscriptionPatch {
            status,
            current_period_start,
            current_period_end,
            cancel_at_period_end: Some(object.cancel_at_period_end),
            updated_at: Some(now),
            last_event_at: Some(event_at),
            ..Default::default()
        })
    }

    /// Transition for `customer.subscription.deleted`.
    ///
    /// Cancellation is terminal, so it applies regardless of event age.
    pub fn cancel(
        &self,
        object: &SubscriptionObject,
        event_at: Timestamp,
        now: Timestamp,
    ) -> Transition<SubscriptionPatch> {
        if self.status == SubscriptionStatus::Canceled {
            return Transition::AlreadyApplied;
        }

        let last_event_at = match self.last_event_at {
            Some(last) if event_at.is_before(&last) => last,
            _ => event_at,
        };

        Transition::Apply(SubscriptionPatch {
            status: Some(SubscriptionStatus::Canceled),
            canceled_at: Some(unix(object.canceled_at).unwrap_or(now)),
            updated_at: Some(now),
            last_event_at: Some(last_event_at),
            ..Default::default()
        })
    }

    /// Transition for `invoice.payment_succeeded`.
    ///
    /// Brings a past due, unpaid or incomplete subscription back to active.
    /// Trialing and active records keep their status.
    pub fn record_invoice_paid(
        &self,
        _invoice: &InvoiceObject,
        event_at: Timestamp,
        now: Timestamp,
    ) -> Transition<SubscriptionPatch> {
        if self.status == SubscriptionStatus::Canceled {
            return Transition::Superseded("subscription is canceled");
        }
        if self.payment_passed(&event_at) {
            return Transition::Superseded("a newer invoice event was already applied");
        }

        let status = (self.status.recovers_on_payment() && !self.lifecycle_passed(&event_at))
            .then_some(SubscriptionStatus::Active);
        if status.is_none() && self.last_payment_at == Some(event_at) {
            return Transition::AlreadyApplied;
        }

        Transition::Apply(SubscriptionPatch {
            status,
            last_payment_at: Some(event_at),
            updated_at: Some(now),
            last_payment_event_at: Some(event_at),
            ..Default::default()
        })
    }

    /// Transition for `invoice.payment_failed`.
    pub fn record_invoice_failed(
        &self,
        _invoice: &InvoiceObject,
        event_at: Timestamp,
        now: Timestamp,
    ) -> Transition<SubscriptionPatch> {
        if self.status == SubscriptionStatus::Canceled {
            return Transition::Superseded("subscription is canceled");
        }
        if self.payment_passed(&event_at) {
            return Transition::Superseded("a newer invoice event was already applied");
        }

        let status = (self.status != SubscriptionStatus::PastDue
            && !self.lifecycle_passed(&event_at))
        .then_some(SubscriptionStatus::PastDue);
        if status.is_none() && self.last_payment_failed_at == Some(event_at) {
            return Transition::AlreadyApplied;
        }

        Transition::Apply(SubscriptionPatch {
            status,
            last_payment_failed_at: Some(event_at),
            updated_at: Some(now),
            last_payment_event_at: Some(event_at),
            ..Default::default()
        })
    }
}
