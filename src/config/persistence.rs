//! Persistence configuration

use serde::Deserialize;

use crate::application::Collections;

use super::error::ValidationError;

/// Collection names for the documents the webhooks touch
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PersistenceConfig {
    #[serde(default = "default_orders_collection")]
    pub orders_collection: String,

    #[serde(default = "default_subscriptions_collection")]
    pub subscriptions_collection: String,
}

impl PersistenceConfig {
    pub fn collections(&self) -> Collections {
        Collections {
            orders: self.orders_collection.clone(),
            subscriptions: self.subscriptions_collection.clone(),
        }
    }

    /// Validate persistence configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.orders_collection.trim().is_empty() {
            return Err(ValidationError::MissingRequired("ORDERS_COLLECTION"));
        }
        if self.subscriptions_collection.trim().is_empty() {
            return Err(ValidationError::MissingRequired("SUBSCRIPTIONS_COLLECTION"));
        }
        if self.orders_collection == self.subscriptions_collection {
            return Err(ValidationError::SharedCollection);
        }
        Ok(())
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            orders_collection: default_orders_collection(),
            subscriptions_collection: default_subscriptions_collection(),
        }
    }
}

fn default_orders_collection() -> String {
    "orders".to_string()
}

fn default_subscriptions_collection() -> String {
    "subscriptions".to_string()
}
