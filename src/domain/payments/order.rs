//! Order record as seen by the payment webhooks.
//!
//! Orders are created by the marketplace checkout; the webhook side only
//! reads them and writes partial patches.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::Timestamp;

use super::event::PaymentIntentObject;
use super::transition::Transition;

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

/// Order document fields the webhook cares about.
///
/// Other fields written by the marketplace are left untouched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
    #[serde(skip)]
    pub id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: OrderStatus,

    #[serde(default)]
    pub payment_intent_id: Option<String>,

    #[serde(default)]
    pub amount_received: Option<i64>,

    #[serde(default)]
    pub failure_reason: Option<String>,

    #[serde(default)]
    pub paid_at: Option<Timestamp>,

    #[serde(default)]
    pub failed_at: Option<Timestamp>,
}

/// Partial update of an order. Unset fields are not written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_received: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<Timestamp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<Timestamp>,
}

/// Reads an explicit `null` the same way as a missing field.
pub(super) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl OrderPatch {
    /// Serializes only the fields that are set.
    pub fn into_fields(self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

impl Order {
    /// Decodes an order from its stored fields.
    pub fn from_fields(
        id: impl Into<String>,
        fields: &Map<String, Value>,
    ) -> Result<Self, serde_json::Error> {
        let mut order: Order = serde_json::from_value(Value::Object(fields.clone()))?;
        order.id = id.into();
        Ok(order)
    }

    /// Transition for a successful payment.
    ///
    /// A paid order keeps its original `paid_at` on redelivery.
    pub fn mark_paid(&self, intent: &PaymentIntentObject, now: Timestamp) -> Transition<OrderPatch> {
        if self.status == OrderStatus::Paid {
            return if self.payment_intent_id.as_deref() == Some(intent.id.as_str()) {
                Transition::AlreadyApplied
            } else {
                Transition::Superseded("order already paid by another payment intent")
            };
        }

        Transition::Apply(OrderPatch {
            status: Some(OrderStatus::Paid),
            payment_intent_id: Some(intent.id.clone()),
            amount_received: Some(intent.amount_received),
            paid_at: Some(now),
            ..Default::default()
        })
    }

    /// Transition for a failed payment attempt.
    ///
    /// Never downgrades a paid order: a failed attempt delivered after the
    /// success is stale.
    pub fn mark_failed(
        &self,
        intent: &PaymentIntentObject,
        now: Timestamp,
    ) -> Transition<OrderPatch> {
        let reason = intent.failure_reason();

        match self.status {
            OrderStatus::Paid => Transition::Superseded("order already paid"),
            OrderStatus::Failed
                if self.payment_intent_id.as_deref() == Some(intent.id.as_str())
                    && self.failure_reason.as_deref() == Some(reason.as_str()) =>
            {
                Transition::AlreadyApplied
            }
            OrderStatus::Pending | OrderStatus::Failed => Transition::Apply(OrderPatch {
                status: Some(OrderStatus::Failed),
                payment_intent_id: Some(intent.id.clone()),
                failure_reason: Some(reason),
                failed_at: Some(now),
                ..Default::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intent(id: &str) -> PaymentIntentObject {
        serde_json::from_value(json!({
            "id": id,
            "amount_received": 500,
            "metadata": {"order_id": "ord_1"}
        }))
        .unwrap()
    }

    fn failed_intent(id: &str, message: &str) -> PaymentIntentObject {
        serde_json::from_value(json!({
            "id": id,
            "last_payment_error": {"message": message},
            "metadata": {"order_id": "ord_1"}
        }))
        .unwrap()
    }

    fn order(fields: Value) -> Order {
        Order::from_fields("ord_1", fields.as_object().unwrap()).unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // Decoding Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn decodes_order_with_missing_fields_as_pending() {
        let order = order(json!({"template_id": "tpl_9", "buyer": "u_1"}));

        assert_eq!(order.id, "ord_1");
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.payment_intent_id.is_none());
    }

    #[test]
    fn decodes_null_status_as_pending() {
        let order = order(json!({"status": null, "payment_intent_id": null}));

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.payment_intent_id.is_none());
    }

    #[test]
    fn decodes_paid_order() {
        let order = order(json!({
            "status": "paid",
            "payment_intent_id": "pi_1",
            "amount_received": 500,
            "paid_at": "2023-11-14T22:13:20Z"
        }));

        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.amount_received, Some(500));
        assert_eq!(order.paid_at, Timestamp::from_unix_secs(1_700_000_000));
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = OrderPatch {
            status: Some(OrderStatus::Failed),
            failure_reason: Some("declined".to_string()),
            ..Default::default()
        };

        let fields = patch.into_fields().unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields["status"], json!("failed"));
        assert_eq!(fields["failure_reason"], json!("declined"));
    }

    // ══════════════════════════════════════════════════════════════
    // mark_paid Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn pending_order_becomes_paid() {
        let now = Timestamp::now();
        let transition = order(json!({"status": "pending"})).mark_paid(&intent("pi_1"), now);

        let patch = transition.into_patch().unwrap();
        assert_eq!(patch.status, Some(OrderStatus::Paid));
        assert_eq!(patch.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(patch.amount_received, Some(500));
        assert_eq!(patch.paid_at, Some(now));
        assert!(patch.failed_at.is_none());
    }

    #[test]
    fn failed_order_can_still_be_paid() {
        let transition = order(json!({"status": "failed", "payment_intent_id": "pi_1"}))
            .mark_paid(&intent("pi_1"), Timestamp::now());

        assert!(matches!(transition, Transition::Apply(_)));
    }

    #[test]
    fn paid_order_with_same_intent_is_already_applied() {
        let transition = order(json!({"status": "paid", "payment_intent_id": "pi_1"}))
            .mark_paid(&intent("pi_1"), Timestamp::now());

        assert_eq!(transition, Transition::AlreadyApplied);
    }

    #[test]
    fn paid_order_with_other_intent_is_superseded() {
        let transition = order(json!({"status": "paid", "payment_intent_id": "pi_1"}))
            .mark_paid(&intent("pi_2"), Timestamp::now());

        assert!(matches!(transition, Transition::Superseded(_)));
    }

    // ══════════════════════════════════════════════════════════════
    // mark_failed Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn pending_order_becomes_failed_with_reason() {
        let transition = order(json!({}))
            .mark_failed(&failed_intent("pi_1", "Card declined"), Timestamp::now());

        let patch = transition.into_patch().unwrap();
        assert_eq!(patch.status, Some(OrderStatus::Failed));
        assert_eq!(patch.failure_reason.as_deref(), Some("Card declined"));
        assert!(patch.failed_at.is_some());
        assert!(patch.paid_at.is_none());
    }

    #[test]
    fn paid_order_is_never_downgraded() {
        let transition = order(json!({"status": "paid", "payment_intent_id": "pi_1"}))
            .mark_failed(&failed_intent("pi_1", "late failure"), Timestamp::now());

        assert!(matches!(transition, Transition::Superseded(_)));
    }

    #[test]
    fn repeated_failure_is_already_applied() {
        let transition = order(json!({
            "status": "failed",
            "payment_intent_id": "pi_1",
            "failure_reason": "Card declined"
        }))
        .mark_failed(&failed_intent("pi_1", "Card declined"), Timestamp::now());

        assert_eq!(transition, Transition::AlreadyApplied);
    }

    #[test]
    fn new_failure_reason_is_recorded() {
        let transition = order(json!({
            "status": "failed",
            "payment_intent_id": "pi_1",
            "failure_reason": "Card declined"
        }))
        .mark_failed(&failed_intent("pi_1", "Insufficient funds"), Timestamp::now());

        let patch = transition.into_patch().unwrap();
        assert_eq!(patch.failure_reason.as_deref(), Some("Insufficient funds"));
    }
}
