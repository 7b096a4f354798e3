//! Payment configuration

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::payments::{WebhookVerifier, DEFAULT_TOLERANCE_SECS};

use super::error::ValidationError;

/// Longest replay window accepted by validation (one day).
const MAX_TOLERANCE_SECS: u64 = 86_400;

/// Payment configuration (Stripe webhooks)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: SecretString,

    /// Accepted distance between the signed timestamp and now, in seconds.
    /// `0` disables the check.
    #[serde(default = "default_tolerance")]
    pub signature_tolerance_secs: u64,
}

impl PaymentConfig {
    pub fn new(stripe_webhook_secret: impl Into<String>) -> Self {
        Self {
            stripe_webhook_secret: SecretString::new(stripe_webhook_secret.into()),
            signature_tolerance_secs: default_tolerance(),
        }
    }

    /// Replay window, or `None` when disabled
    pub fn signature_tolerance(&self) -> Option<Duration> {
        match self.signature_tolerance_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Build the verifier for incoming webhooks
    pub fn verifier(&self) -> WebhookVerifier {
        WebhookVerifier::new(self.stripe_webhook_secret.clone())
            .with_tolerance(self.signature_tolerance())
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.stripe_webhook_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }
        if !secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if self.signature_tolerance_secs > MAX_TOLERANCE_SECS {
            return Err(ValidationError::InvalidSignatureTolerance);
        }
        Ok(())
    }
}

fn default_tolerance() -> u64 {
    DEFAULT_TOLERANCE_SECS
}
