//! Integration tests for the payment webhook HTTP endpoint.
//!
//! These tests drive the full router with `tower::ServiceExt::oneshot`:
//! 1. Signed events update orders and subscriptions
//! 2. Verification failures are rejected with 400 and write nothing
//! 3. Store failures and panics surface as JSON 500s

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use template_payments::adapters::http::{payment_router, WebhookAppState};
use template_payments::adapters::InMemoryDocumentStore;
use template_payments::application::Collections;
use template_payments::config::PaymentConfig;
use template_payments::domain::foundation::DomainError;
use template_payments::domain::payments::signature_header;
use template_payments::ports::{Document, DocumentStore, FieldFilter, Fields, SaveResult};

// =============================================================================
// Test Infrastructure
// =============================================================================

const SECRET: &str = "whsec_test";
const T: i64 = 1_700_000_000;

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

/// Router whose verifier accepts any timestamp, so fixed `t` values work.
fn app(store: Arc<dyn DocumentStore>) -> Router {
    let payment = PaymentConfig {
        signature_tolerance_secs: 0,
        ..PaymentConfig::new(SECRET)
    };
    payment_router(WebhookAppState::new(
        payment.verifier(),
        store,
        Collections::default(),
    ))
}

fn webhook_request(signature: Option<String>, body: &[u8]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("Stripe-Signature", signature);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn payment_success_body() -> Vec<u8> {
    br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_1","amount_received":500,"metadata":{"order_id":"ord_1"}}}}"#.to_vec()
}

async fn store_with_pending_order() -> InMemoryDocumentStore {
    let store = InMemoryDocumentStore::new();
    store
        .seed("orders", "ord_1", fields(json!({"status": "pending", "template_id": "tpl_1"})))
        .await;
    store
}

/// Store whose every call fails.
struct UnavailableStore;

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn get(&self, _: &str, _: &str) -> Result<Option<Document>, DomainError> {
        Err(DomainError::new(
            template_payments::domain::foundation::ErrorCode::DatabaseError,
            "connection refused",
        ))
    }

    async fn list(&self, _: &str, _: &FieldFilter) -> Result<Vec<Document>, DomainError> {
        Ok(Vec::new())
    }

    async fn create(&self, _: &str, _: &str, _: Fields) -> Result<SaveResult, DomainError> {
        Ok(SaveResult::Inserted)
    }

    async fn update(&self, _: &str, _: &str, _: Fields) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Store that panics on read.
struct PanickingStore;

#[async_trait]
impl DocumentStore for PanickingStore {
    async fn get(&self, _: &str, _: &str) -> Result<Option<Document>, DomainError> {
        panic!("store exploded")
    }

    async fn list(&self, _: &str, _: &FieldFilter) -> Result<Vec<Document>, DomainError> {
        panic!("store exploded")
    }

    async fn create(&self, _: &str, _: &str, _: Fields) -> Result<SaveResult, DomainError> {
        panic!("store exploded")
    }

    async fn update(&self, _: &str, _: &str, _: Fields) -> Result<(), DomainError> {
        panic!("store exploded")
    }
}

// =============================================================================
// Payment Events
// =============================================================================

#[tokio::test]
async fn signed_payment_success_marks_order_paid() {
    let store = store_with_pending_order().await;
    let body = payment_success_body();
    let signature = signature_header(SECRET, T, &body);

    let (status, json) = send(
        app(Arc::new(store.clone())),
        webhook_request(Some(signature), &body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], json!(true));
    assert_eq!(json["event_type"], json!("payment_intent.succeeded"));
    assert!(json["processed_at"].is_string());

    let order = store.get("orders", "ord_1").await.unwrap().unwrap();
    assert_eq!(order.fields["status"], json!("paid"));
    assert_eq!(order.fields["amount_received"], json!(500));
    assert_eq!(order.fields["payment_intent_id"], json!("pi_1"));
    assert!(order.fields["paid_at"].is_string());
    assert_eq!(order.fields["template_id"], json!("tpl_1"));
}

#[tokio::test]
async fn wrong_secret_is_rejected_and_order_untouched() {
    let store = store_with_pending_order().await;
    let body = payment_success_body();
    let signature = signature_header("whsec_other", T, &body);

    let (status, json) = send(
        app(Arc::new(store.clone())),
        webhook_request(Some(signature), &body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"success": false, "error": "Invalid signature"}));
    assert_eq!(store.write_count(), 0);
    let order = store.get("orders", "ord_1").await.unwrap().unwrap();
    assert_eq!(order.fields["status"], json!("pending"));
}

#[tokio::test]
async fn unknown_event_kind_is_acknowledged_without_writes() {
    let store = store_with_pending_order().await;
    let body = br#"{"type":"foo.bar","data":{"object":{"id":"x_1"}}}"#;
    let signature = signature_header(SECRET, T, body);

    let (status, json) = send(
        app(Arc::new(store.clone())),
        webhook_request(Some(signature), body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], json!(true));
    assert_eq!(json["event_type"], json!("foo.bar"));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn duplicate_payment_success_keeps_order_paid() {
    let store = store_with_pending_order().await;
    let body = payment_success_body();

    for _ in 0..2 {
        let signature = signature_header(SECRET, T, &body);
        let (status, _) = send(
            app(Arc::new(store.clone())),
            webhook_request(Some(signature), &body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(store.write_count(), 1);
    let order = store.get("orders", "ord_1").await.unwrap().unwrap();
    assert_eq!(order.fields["status"], json!("paid"));
}

#[tokio::test]
async fn payment_for_unknown_order_is_acknowledged() {
    let store = InMemoryDocumentStore::new();
    let body = payment_success_body();
    let signature = signature_header(SECRET, T, &body);

    let (status, json) = send(
        app(Arc::new(store.clone())),
        webhook_request(Some(signature), &body),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], json!(true));
    assert_eq!(store.count("orders").await, 0);
}

// =============================================================================
// Subscription Events
// =============================================================================

#[tokio::test]
async fn duplicate_subscription_created_leaves_one_document() {
    let store = InMemoryDocumentStore::new();
    let body = serde_json::to_vec(&json!({
        "id": "evt_sub",
        "type": "customer.subscription.created",
        "created": T,
        "data": {"object": {
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "current_period_start": T,
            "current_period_end": T + 2_592_000
        }}
    }))
    .unwrap();

    for _ in 0..2 {
        let signature = signature_header(SECRET, T, &body);
        let (status, _) = send(
            app(Arc::new(store.clone())),
            webhook_request(Some(signature), &body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let docs = store
        .list("subscriptions", &FieldFilter::equals("stripe_subscription_id", "sub_1"))
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].fields["stripe_customer_id"], json!("cus_1"));
    assert_eq!(docs[0].fields["status"], json!("active"));
}

#[tokio::test]
async fn subscription_lifecycle_over_http() {
    let store = InMemoryDocumentStore::new();
    let events = [
        json!({"type": "customer.subscription.created", "created": T,
               "data": {"object": {"id": "sub_1", "customer": "cus_1", "status": "active"}}}),
        json!({"type": "invoice.payment_failed", "created": T + 10,
               "data": {"object": {"id": "in_1", "subscription": "sub_1"}}}),
        json!({"type": "invoice.payment_succeeded", "created": T + 20,
               "data": {"object": {"id": "in_2", "subscription": "sub_1", "amount_paid": 900}}}),
        json!({"type": "customer.subscription.deleted", "created": T + 30,
               "data": {"object": {"id": "sub_1", "customer": "cus_1", "status": "canceled",
                                   "canceled_at": T + 30}}}),
    ];

    for event in &events {
        let body = serde_json::to_vec(event).unwrap();
        let signature = signature_header(SECRET, T, &body);
        let (status, _) = send(
            app(Arc::new(store.clone())),
            webhook_request(Some(signature), &body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let docs = store
        .list("subscriptions", &FieldFilter::equals("stripe_subscription_id", "sub_1"))
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    let sub = &docs[0].fields;
    assert_eq!(sub["status"], json!("canceled"));
    assert!(sub["last_payment_at"].is_string());
    assert!(sub["last_payment_failed_at"].is_string());
    assert_eq!(sub["canceled_at"], json!("2023-11-14T22:13:50Z"));
}

// =============================================================================
// Verification Failures
// =============================================================================

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let store = store_with_pending_order().await;

    let (status, json) = send(
        app(Arc::new(store.clone())),
        webhook_request(None, &payment_success_body()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], json!(false));
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Malformed signature header"));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn malformed_body_with_valid_signature_is_rejected() {
    let store = InMemoryDocumentStore::new();
    let body = b"{not json";
    let signature = signature_header(SECRET, T, body);

    let (status, json) = send(
        app(Arc::new(store.clone())),
        webhook_request(Some(signature), body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Malformed payload"));
}

#[tokio::test]
async fn stale_timestamp_is_rejected_when_tolerance_enabled() {
    let store = store_with_pending_order().await;
    let app = payment_router(WebhookAppState::new(
        PaymentConfig::new(SECRET).verifier(),
        Arc::new(store.clone()),
        Collections::default(),
    ));
    let body = payment_success_body();
    let signature = signature_header(SECRET, T, &body);

    let (status, json) = send(app, webhook_request(Some(signature), &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json,
        json!({"success": false, "error": "Timestamp outside tolerance"})
    );
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn fresh_timestamp_is_accepted_when_tolerance_enabled() {
    let store = store_with_pending_order().await;
    let app = payment_router(WebhookAppState::new(
        PaymentConfig::new(SECRET).verifier(),
        Arc::new(store.clone()),
        Collections::default(),
    ));
    let body = payment_success_body();
    let now = chrono::Utc::now().timestamp();
    let signature = signature_header(SECRET, now, &body);

    let (status, _) = send(app, webhook_request(Some(signature), &body)).await;

    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Server Failures
// =============================================================================

#[tokio::test]
async fn store_failure_returns_500_for_retry() {
    let body = payment_success_body();
    let signature = signature_header(SECRET, T, &body);

    let (status, json) = send(
        app(Arc::new(UnavailableStore)),
        webhook_request(Some(signature), &body),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], json!(false));
    assert!(json["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn handler_panic_returns_json_500() {
    let body = payment_success_body();
    let signature = signature_header(SECRET, T, &body);

    let (status, json) = send(
        app(Arc::new(PanickingStore)),
        webhook_request(Some(signature), &body),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({"success": false, "error": "Internal server error"}));
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, json) = send(app(Arc::new(InMemoryDocumentStore::new())), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "ok"}));
}
