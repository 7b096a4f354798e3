//! Order transitions for `payment_intent.*` events.

use tracing::info;

use crate::domain::foundation::Timestamp;
use crate::domain::payments::{Order, OrderPatch, PaymentIntentObject, Transition, WebhookError};
use crate::ports::DocumentStore;

use super::event_router::{commit, serialization, TransitionOutcome};

/// `payment_intent.succeeded`: mark the linked order paid.
pub(super) async fn payment_succeeded(
    store: &dyn DocumentStore,
    collection: &str,
    intent: &PaymentIntentObject,
    now: Timestamp,
) -> Result<TransitionOutcome, WebhookError> {
    let Some(order) = load_order(store, collection, intent).await? else {
        return Ok(TransitionOutcome::LookupMiss);
    };

    let transition = order.mark_paid(intent, now);
    write(store, collection, &order.id, transition).await
}

/// `payment_intent.payment_failed`: record the failure on the linked order.
pub(super) async fn payment_failed(
    store: &dyn DocumentStore,
    collection: &str,
    intent: &PaymentIntentObject,
    now: Timestamp,
) -> Result<TransitionOutcome, WebhookError> {
    let Some(order) = load_order(store, collection, intent).await? else {
        return Ok(TransitionOutcome::LookupMiss);
    };

    let transition = order.mark_failed(intent, now);
    write(store, collection, &order.id, transition).await
}

async fn load_order(
    store: &dyn DocumentStore,
    collection: &str,
    intent: &PaymentIntentObject,
) -> Result<Option<Order>, WebhookError> {
    let Some(order_id) = intent.order_id() else {
        info!(payment_intent_id = %intent.id, "Payment intent carries no order_id");
        return Ok(None);
    };

    let Some(doc) = store.get(collection, order_id).await? else {
        info!(order_id, payment_intent_id = %intent.id, "Order not found");
        return Ok(None);
    };

    Order::from_fields(doc.id, &doc.fields)
        .map(Some)
        .map_err(serialization)
}

async fn write(
    store: &dyn DocumentStore,
    collection: &str,
    order_id: &str,
    transition: Transition<OrderPatch>,
) -> Result<TransitionOutcome, WebhookError> {
    let transition = transition
        .try_map(OrderPatch::into_fields)
        .map_err(serialization)?;
    let outcome = commit(store, collection, order_id, transition).await?;
    info!(order_id, outcome = %outcome, "Order transition");
    Ok(outcome)
}
