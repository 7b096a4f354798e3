//! Payment webhook signature verification.
//!
//! Implements verification of Stripe-style webhook signatures using
//! HMAC-SHA256 over `"{t}.{raw body}"`. Includes an optional timestamp
//! tolerance to limit replay of captured requests.

use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::event::VerifiedEvent;
use super::webhook_errors::WebhookError;

/// Default replay window (5 minutes either side of now).
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Parsed components from the signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// Every `v1` signature (lowercase hex). Several appear while the
    /// signer rotates secrets.
    pub v1_signatures: Vec<String>,
}

impl SignatureHeader {
    /// Parses a signature header string.
    ///
    /// Format: `t=<timestamp>,v1=<signature>[,v1=<signature>][,v0=<legacy>]`
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MalformedHeader` if the header format is invalid.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::MalformedHeader("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::MalformedHeader("invalid timestamp".to_string())
                    })?);
                }
                "v1" => v1_signatures.push(value.to_string()),
                _ => {
                    // Other schemes (v0, future versions) are ignored
                }
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| WebhookError::MalformedHeader("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::MalformedHeader(
                "missing v1 signature".to_string(),
            ));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifier for payment webhook signatures.
pub struct WebhookVerifier {
    /// The endpoint signing secret shared with the provider.
    secret: SecretString,
    /// Maximum distance between the signed timestamp and now.
    tolerance: Option<Duration>,
}

impl WebhookVerifier {
    /// Creates a verifier with the default replay tolerance.
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance: Some(Duration::from_secs(DEFAULT_TOLERANCE_SECS)),
        }
    }

    /// Sets the replay tolerance; `None` accepts any timestamp.
    pub fn with_tolerance(mut self, tolerance: Option<Duration>) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn tolerance(&self) -> Option<Duration> {
        self.tolerance
    }

    /// Verifies the webhook signature and parses the event.
    pub fn verify(
        &self,
        signature_header: &str,
        payload: &[u8],
    ) -> Result<VerifiedEvent, WebhookError> {
        self.verify_at(signature_header, payload, chrono::Utc::now().timestamp())
    }

    /// Verifies against an explicit clock reading (Unix seconds).
    ///
    /// # Verification Steps
    ///
    /// 1. Parse the signature header
    /// 2. Compute expected signature using HMAC-SHA256
    /// 3. Compare against every `v1` using constant-time comparison
    /// 4. Validate timestamp is within tolerance
    /// 5. Parse the JSON payload into a VerifiedEvent
    ///
    /// # Errors
    ///
    /// - `MalformedHeader` - Header missing `t` or `v1`, or unparseable
    /// - `InvalidSignature` - No signature matched
    /// - `TimestampOutOfRange` - Signed timestamp outside tolerance
    /// - `MalformedPayload` - Body is not a valid event envelope
    pub fn verify_at(
        &self,
        signature_header: &str,
        payload: &[u8],
        now: i64,
    ) -> Result<VerifiedEvent, WebhookError> {
        // 1. Parse signature header
        let header = SignatureHeader::parse(signature_header)?;

        // 2. Compute expected signature
        let expected = compute_signature(
            self.secret.expose_secret().as_bytes(),
            header.timestamp,
            payload,
        );

        // 3. Compare signatures (constant-time, every candidate checked)
        let mut matched = false;
        for candidate in &header.v1_signatures {
            matched |= constant_time_compare(expected.as_bytes(), candidate.as_bytes());
        }
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        // 4. Validate timestamp
        self.validate_timestamp(header.timestamp, now)?;

        // 5. Parse event
        VerifiedEvent::from_signed_body(header.timestamp, payload)
    }

    /// Validates that the timestamp is within the tolerance window.
    fn validate_timestamp(&self, timestamp: i64, now: i64) -> Result<(), WebhookError> {
        let Some(tolerance) = self.tolerance else {
            return Ok(());
        };

        let age = now.saturating_sub(timestamp).unsigned_abs();
        if age > tolerance.as_secs() {
            return Err(WebhookError::TimestampOutOfRange);
        }

        Ok(())
    }
}

/// Computes the lowercase hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
///
/// The body bytes are signed as received; re-encoding them would change
/// the signature.
pub fn compute_signature(secret: &[u8], timestamp: i64, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts any key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds a complete signature header value, as the provider would send it.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        compute_signature(secret.as_bytes(), timestamp, payload)
    )
}

/// Performs constant-time comparison of two byte slices.
///
/// This prevents timing attacks that could leak information about the expected signature.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
