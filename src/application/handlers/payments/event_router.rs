//! EventRouter - Routes verified payment events to their state transitions.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::payments::{EventPayload, Transition, VerifiedEvent, WebhookError};
use crate::ports::{DocumentStore, Fields};

use super::{order_events, subscription_events};

/// What processing an event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// A patch or a new document was written.
    Applied,
    /// The record already reflected the event; nothing was written.
    AlreadyApplied,
    /// No record to act on (or no key to find one by).
    LookupMiss,
    /// The record holds a newer or terminal state; the event was dropped.
    Superseded,
    /// Event kind without a registered transition.
    Unhandled,
}

impl TransitionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionOutcome::Applied => "applied",
            TransitionOutcome::AlreadyApplied => "already_applied",
            TransitionOutcome::LookupMiss => "lookup_miss",
            TransitionOutcome::Superseded => "superseded",
            TransitionOutcome::Unhandled => "unhandled",
        }
    }

    /// Returns true if the event caused a write.
    pub fn wrote(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}

impl fmt::Display for TransitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collection names the router reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub orders: String,
    pub subscriptions: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            orders: "orders".to_string(),
            subscriptions: "subscriptions".to_string(),
        }
    }
}

/// Dispatches each verified event to the handler for its kind.
///
/// Holds only the injected store and collection names; every call is
/// independent of the previous one.
#[derive(Clone)]
pub struct EventRouter {
    store: Arc<dyn DocumentStore>,
    collections: Collections,
}

impl EventRouter {
    pub fn new(store: Arc<dyn DocumentStore>, collections: Collections) -> Self {
        Self { store, collections }
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Routes an event using the current time for written timestamps.
    pub async fn dispatch(&self, event: &VerifiedEvent) -> Result<TransitionOutcome, WebhookError> {
        self.dispatch_at(event, Timestamp::now()).await
    }

    /// Routes an event with an explicit "now".
    ///
    /// # Errors
    ///
    /// Only `WebhookError::Persistence`; missing records are reported as
    /// `TransitionOutcome::LookupMiss`.
    pub async fn dispatch_at(
        &self,
        event: &VerifiedEvent,
        now: Timestamp,
    ) -> Result<TransitionOutcome, WebhookError> {
        let store = self.store.as_ref();
        let orders = self.collections.orders.as_str();
        let subscriptions = self.collections.subscriptions.as_str();
        let event_at = Timestamp::from_unix_secs(event.effective_timestamp()).unwrap_or(now);

        let outcome = match event.payload() {
            EventPayload::PaymentSucceeded(intent) => {
                order_events::payment_succeeded(store, orders, intent, now).await?
            }
            EventPayload::PaymentFailed(intent) => {
                order_events::payment_failed(store, orders, intent, now).await?
            }
            EventPayload::SubscriptionCreated(object) => {
                subscription_events::created(store, subscriptions, object, event_at, now).await?
            }
            EventPayload::SubscriptionUpdated(object) => {
                subscription_events::updated(store, subscriptions, object, event_at, now).await?
            }
            EventPayload::SubscriptionDeleted(object) => {
                subscription_events::deleted(store, subscriptions, object, event_at, now).await?
            }
            EventPayload::InvoicePaymentSucceeded(invoice) => {
                subscription_events::invoice_paid(store, subscriptions, invoice, event_at, now)
                    .await?
            }
            EventPayload::InvoicePaymentFailed(invoice) => {
                subscription_events::invoice_failed(store, subscriptions, invoice, event_at, now)
                    .await?
            }
            EventPayload::Unrecognized(_) => {
                info!(event_type = %event.event_type(), "Unhandled webhook event type");
                TransitionOutcome::Unhandled
            }
        };

        info!(
            event_type = %event.event_type(),
            event_id = event.id().unwrap_or("-"),
            outcome = %outcome,
            "Webhook event processed"
        );

        Ok(outcome)
    }
}

/// Writes a transition computed against the document `id`.
///
/// A document deleted between the read and the write counts as a lookup miss.
pub(super) async fn commit(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    transition: Transition<Fields>,
) -> Result<TransitionOutcome, WebhookError> {
    match transition {
        Transition::Apply(patch) => match store.update(collection, id, patch).await {
            Ok(()) => Ok(TransitionOutcome::Applied),
            Err(e) if e.code == ErrorCode::NotFound => {
                info!(collection, id, "Document disappeared before update");
                Ok(TransitionOutcome::LookupMiss)
            }
            Err(e) => Err(e.into()),
        },
        Transition::AlreadyApplied => Ok(TransitionOutcome::AlreadyApplied),
        Transition::Superseded(reason) => {
            info!(collection, id, reason, "Event superseded by stored state");
            Ok(TransitionOutcome::Superseded)
        }
    }
}

/// Serialization failures of stored or outgoing documents surface as
/// persistence errors so the sender retries.
pub(super) fn serialization(e: serde_json::Error) -> WebhookError {
    DomainError::from(e).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::document_store::InMemoryDocumentStore;
    use crate::domain::payments::signature_header;
    use crate::domain::payments::WebhookVerifier;
    use secrecy::SecretString;
    use serde_json::{json, Value};

    const SECRET: &str = "whsec_test";
    const T: i64 = 1_700_000_000;

    fn event(body: Value) -> VerifiedEvent {
        let raw = serde_json::to_vec(&body).unwrap();
        let header = signature_header(SECRET, T, &raw);
        WebhookVerifier::new(SecretString::new(SECRET.to_string()))
            .verify_at(&header, &raw, T)
            .unwrap()
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn router(store: &InMemoryDocumentStore) -> EventRouter {
        EventRouter::new(Arc::new(store.clone()), Collections::default())
    }

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(T + 5).unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // Routing Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_kind_is_unhandled_without_writes() {
        let store = InMemoryDocumentStore::new();
        store.seed("orders", "ord_1", fields(json!({"status": "pending"}))).await;

        let outcome = router(&store)
            .dispatch_at(&event(json!({"type": "foo.bar", "data": {"object": {}}})), now())
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::Unhandled);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn payment_success_routes_to_order() {
        let store = InMemoryDocumentStore::new();
        store.seed("orders", "ord_1", fields(json!({"status": "pending"}))).await;

        let outcome = router(&store)
            .dispatch_at(
                &event(json!({
                    "type": "payment_intent.succeeded",
                    "data": {"object": {"id": "pi_1", "amount_received": 500, "metadata": {"order_id": "ord_1"}}}
                })),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::Applied);
        let doc = store.get("orders", "ord_1").await.unwrap().unwrap();
        assert_eq!(doc.fields["status"], json!("paid"));
    }

    #[tokio::test]
    async fn subscription_created_routes_to_configured_collection() {
        let store = InMemoryDocumentStore::new();
        let router = EventRouter::new(
            Arc::new(store.clone()),
            Collections {
                orders: "marketplace_orders".to_string(),
                subscriptions: "marketplace_subscriptions".to_string(),
            },
        );

        let outcome = router
            .dispatch_at(
                &event(json!({
                    "type": "customer.subscription.created",
                    "data": {"object": {"id": "sub_1", "customer": "cus_1", "status": "active"}}
                })),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::Applied);
        assert_eq!(store.count("marketplace_subscriptions").await, 1);
        assert_eq!(store.count("subscriptions").await, 0);
    }

    // ══════════════════════════════════════════════════════════════
    // Commit Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn commit_of_missing_document_is_lookup_miss() {
        let store = InMemoryDocumentStore::new();

        let outcome = commit(
            &store,
            "orders",
            "gone",
            Transition::Apply(fields(json!({"status": "paid"}))),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TransitionOutcome::LookupMiss);
    }

    #[tokio::test]
    async fn commit_superseded_writes_nothing() {
        let store = InMemoryDocumentStore::new();
        store.seed("orders", "ord_1", Fields::new()).await;

        let outcome = commit(&store, "orders", "ord_1", Transition::Superseded("stale"))
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::Superseded);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn outcome_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_value(TransitionOutcome::AlreadyApplied).unwrap(),
            json!("already_applied")
        );
        assert_eq!(TransitionOutcome::LookupMiss.to_string(), "lookup_miss");
        assert!(TransitionOutcome::Applied.wrote());
        assert!(!TransitionOutcome::Unhandled.wrote());
    }
}
