//! Webhook error types for payment webhook handling.
//!
//! Defines all error conditions that can occur during webhook processing,
//! with HTTP status code mapping and retryability semantics.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Errors that occur during webhook processing.
///
/// Records that cannot be found are not errors; handlers report them as
/// `TransitionOutcome::LookupMiss` and the event is acknowledged.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing, or lacking a timestamp or `v1` signature.
    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),

    /// No supplied `v1` signature matched the computed one.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp is outside the configured tolerance window.
    #[error("Timestamp outside tolerance")]
    TimestampOutOfRange,

    /// Body is not a valid event envelope, or its object does not match its kind.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// A store read or write failed.
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl WebhookError {
    /// Returns true if the sender should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Persistence(_))
    }

    /// Maps the error to an appropriate HTTP status code.
    ///
    /// Status codes determine the sender's retry behavior:
    /// - 4xx: rejected, no retry
    /// - 5xx: server error, the whole event is redelivered
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MalformedHeader(_)
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,

            WebhookError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    // ══════════════════════════════════════════════════════════════
    // Error Display Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn invalid_signature_displays_correctly() {
        let err = WebhookError::InvalidSignature;
        assert_eq!(format!("{}", err), "Invalid signature");
    }

    #[test]
    fn malformed_header_displays_reason() {
        let err = WebhookError::MalformedHeader("missing timestamp".to_string());
        assert_eq!(
            format!("{}", err),
            "Malformed signature header: missing timestamp"
        );
    }

    #[test]
    fn malformed_payload_displays_reason() {
        let err = WebhookError::MalformedPayload("expected value".to_string());
        assert_eq!(format!("{}", err), "Malformed payload: expected value");
    }

    #[test]
    fn domain_error_converts_to_persistence() {
        let err: WebhookError = DomainError::new(ErrorCode::DatabaseError, "timeout").into();
        assert!(matches!(err, WebhookError::Persistence(ref m) if m.contains("timeout")));
    }

    // ══════════════════════════════════════════════════════════════
    // Retryability Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn persistence_error_is_retryable() {
        let err = WebhookError::Persistence("connection reset".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn verification_failures_are_not_retryable() {
        let errors = [
            WebhookError::MalformedHeader("x".to_string()),
            WebhookError::InvalidSignature,
            WebhookError::TimestampOutOfRange,
            WebhookError::MalformedPayload("x".to_string()),
        ];

        for err in errors {
            assert!(!err.is_retryable(), "{} should not be retryable", err);
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Status Code Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn verification_failures_return_bad_request() {
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::TimestampOutOfRange.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::MalformedHeader("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::MalformedPayload("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn persistence_error_returns_internal_error() {
        let err = WebhookError::Persistence("disk full".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
