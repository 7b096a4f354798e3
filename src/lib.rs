//! Template Payments - Payment webhook ingestion for the function template marketplace.
//!
//! Verifies signed payment-provider webhooks and applies idempotent state
//! transitions to order and subscription documents.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
