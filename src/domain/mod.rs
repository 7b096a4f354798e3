//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (timestamps, errors)
//! - `payments` - Webhook verification, orders and subscriptions

pub mod foundation;
pub mod payments;
