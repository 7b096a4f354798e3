//! Subscription transitions for `customer.subscription.*` and `invoice.*` events.
//!
//! Subscriptions are located by their provider id through a field search.
//! New records get a document id derived from that provider id, so two
//! concurrent "created" deliveries collide on insert.

use tracing::{info, warn};

use crate::domain::foundation::Timestamp;
use crate::domain::payments::{
    InvoiceObject, Subscription, SubscriptionObject, SubscriptionPatch, Transition, WebhookError,
    EXTERNAL_ID_FIELD,
};
use crate::ports::{DocumentStore, FieldFilter, SaveResult};

use super::event_router::{commit, serialization, TransitionOutcome};

/// `customer.subscription.created`: create the record once.
pub(super) async fn created(
    store: &dyn DocumentStore,
    collection: &str,
    object: &SubscriptionObject,
    event_at: Timestamp,
    now: Timestamp,
) -> Result<TransitionOutcome, WebhookError> {
    if find(store, collection, &object.id).await?.is_some() {
        info!(subscription_id = %object.id, "Subscription already recorded");
        return Ok(TransitionOutcome::AlreadyApplied);
    }

    let subscription = Subscription::from_created_event(object, event_at, now);
    let fields = subscription.to_fields().map_err(serialization)?;

    let outcome = match store.create(collection, &subscription.id, fields).await? {
        SaveResult::Inserted => TransitionOutcome::Applied,
        SaveResult::AlreadyExists => TransitionOutcome::AlreadyApplied,
    };
    info!(
        subscription_id = %object.id,
        document_id = %subscription.id,
        outcome = %outcome,
        "Subscription created"
    );
    Ok(outcome)
}

/// `customer.subscription.updated`: copy status and period bounds.
pub(super) async fn updated(
    store: &dyn DocumentStore,
    collection: &str,
    object: &SubscriptionObject,
    event_at: Timestamp,
    now: Timestamp,
) -> Result<TransitionOutcome, WebhookError> {
    let Some(subscription) = find(store, collection, &object.id).await? else {
        return Ok(lookup_miss(&object.id));
    };

    let transition = subscription.apply_update(object, event_at, now);
    write(store, collection, &subscription, transition).await
}

/// `customer.subscription.deleted`: mark canceled.
pub(super) async fn deleted(
    store: &dyn DocumentStore,
    collection: &str,
    object: &SubscriptionObject,
    event_at: Timestamp,
    now: Timestamp,
) -> Result<TransitionOutcome, WebhookError> {
    let Some(subscription) = find(store, collection, &object.id).await? else {
        return Ok(lookup_miss(&object.id));
    };

    let transition = subscription.cancel(object, event_at, now);
    write(store, collection, &subscription, transition).await
}

/// `invoice.payment_succeeded`: record the payment on the subscription.
pub(super) async fn invoice_paid(
    store: &dyn DocumentStore,
    collection: &str,
    invoice: &InvoiceObject,
    event_at: Timestamp,
    now: Timestamp,
) -> Result<TransitionOutcome, WebhookError> {
    let Some(subscription) = find_for_invoice(store, collection, invoice).await? else {
        return Ok(TransitionOutcome::LookupMiss);
    };

    let transition = subscription.record_invoice_paid(invoice, event_at, now);
    write(store, collection, &subscription, transition).await
}

/// `invoice.payment_failed`: mark the subscription past due.
pub(super) async fn invoice_failed(
    store: &dyn DocumentStore,
    collection: &str,
    invoice: &InvoiceObject,
    event_at: Timestamp,
    now: Timestamp,
) -> Result<TransitionOutcome, WebhookError> {
    let Some(subscription) = find_for_invoice(store, collection, invoice).await? else {
        return Ok(TransitionOutcome::LookupMiss);
    };

    let transition = subscription.record_invoice_failed(invoice, event_at, now);
    write(store, collection, &subscription, transition).await
}

/// Resolves a provider subscription id to the stored record.
async fn find(
    store: &dyn DocumentStore,
    collection: &str,
    external_id: &str,
) -> Result<Option<Subscription>, WebhookError> {
    let docs = store
        .list(collection, &FieldFilter::equals(EXTERNAL_ID_FIELD, external_id))
        .await?;

    if docs.len() > 1 {
        warn!(
            subscription_id = external_id,
            matches = docs.len(),
            "Duplicate subscription records, using the first"
        );
    }

    docs.into_iter()
        .next()
        .map(|doc| Subscription::from_fields(doc.id, &doc.fields))
        .transpose()
        .map_err(serialization)
}

async fn find_for_invoice(
    store: &dyn DocumentStore,
    collection: &str,
    invoice: &InvoiceObject,
) -> Result<Option<Subscription>, WebhookError> {
    let Some(external_id) = invoice.subscription.as_deref() else {
        info!(invoice_id = %invoice.id, "Invoice is not tied to a subscription");
        return Ok(None);
    };

    let subscription = find(store, collection, external_id).await?;
    if subscription.is_none() {
        lookup_miss(external_id);
    }
    Ok(subscription)
}

fn lookup_miss(external_id: &str) -> TransitionOutcome {
    info!(subscription_id = external_id, "Subscription not found");
    TransitionOutcome::LookupMiss
}

async fn write(
    store: &dyn DocumentStore,
    collection: &str,
    subscription: &Subscription,
    transition: Transition<SubscriptionPatch>,
) -> Result<TransitionOutcome, WebhookError> {
    let transition = transition
        .try_map(SubscriptionPatch::into_fields)
        .map_err(serialization)?;
    let outcome = commit(store, collection, &subscription.id, transition).await?;
    info!(
        subscription_id = %subscription.external_subscription_id,
        outcome = %outcome,
        "Subscription transition"
    );
    Ok(outcome)
}
