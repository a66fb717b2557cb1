//! Error types for evidence recording.
//!
//! Every failure the SDK can report, whether raised before any I/O, returned
//! from a synchronous delivery, or handed to an error hook from the worker,
//! is a [`DeliveryError`] tagged with an [`ErrorCode`].

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Kind of failure, serialized as its wire string (e.g. `MAX_RETRIES`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No API key was configured.
    MissingApiKey,
    /// The record has no policy identifier.
    MissingPolicy,
    /// The record's input map is empty.
    InvalidInput,
    /// The record's output map is empty.
    InvalidOutput,
    /// Confidence is not a finite number in `[0, 1]`.
    InvalidConfidence,
    /// The idempotency key is neither a UUID v4 nor 16-64 URL-safe chars.
    InvalidIdempotencyKey,
    /// The delivery queue no longer accepts records.
    QueueClosed,
    /// The delivery queue dropped a record to stay within capacity.
    QueueFull,
    /// The remote service rejected the record (4xx other than 429).
    RequestFailed,
    /// Every attempt hit a retryable failure (429, 5xx, timeout, connect).
    MaxRetries,
    /// An unexpected local failure during delivery.
    UnknownError,
    /// The worker hit a failure that was not already classified.
    QueueError,
    /// `flush` ran out of time with records still pending.
    FlushTimeout,
    /// The client configuration cannot be used (bad base URL, HTTP client setup).
    InvalidConfig,
    /// Async mode was requested outside a Tokio runtime.
    MissingRuntime,
    /// A code reported by the remote service that the SDK does not define.
    Remote(String),
}

impl ErrorCode {
    /// Wire representation of the code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::MissingApiKey => "MISSING_API_KEY",
            Self::MissingPolicy => "MISSING_POLICY",
            Self::InvalidInput => "INVALID_INPUT",
            Self::InvalidOutput => "INVALID_OUTPUT",
            Self::InvalidConfidence => "INVALID_CONFIDENCE",
            Self::InvalidIdempotencyKey => "INVALID_IDEMPOTENCY_KEY",
            Self::QueueClosed => "QUEUE_CLOSED",
            Self::QueueFull => "QUEUE_FULL",
            Self::RequestFailed => "REQUEST_FAILED",
            Self::MaxRetries => "MAX_RETRIES",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::QueueError => "QUEUE_ERROR",
            Self::FlushTimeout => "FLUSH_TIMEOUT",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::MissingRuntime => "MISSING_RUNTIME",
            Self::Remote(code) => code,
        }
    }

    /// Parse a code string, as found in a remote error body.
    ///
    /// Strings matching an SDK code map to that variant; anything else is kept
    /// verbatim as [`ErrorCode::Remote`].
    pub fn from_wire(code: &str) -> Self {
        match code {
            "MISSING_API_KEY" => Self::MissingApiKey,
            "MISSING_POLICY" => Self::MissingPolicy,
            "INVALID_INPUT" => Self::InvalidInput,
            "INVALID_OUTPUT" => Self::InvalidOutput,
            "INVALID_CONFIDENCE" => Self::InvalidConfidence,
            "INVALID_IDEMPOTENCY_KEY" => Self::InvalidIdempotencyKey,
            "QUEUE_CLOSED" => Self::QueueClosed,
            "QUEUE_FULL" => Self::QueueFull,
            "REQUEST_FAILED" => Self::RequestFailed,
            "MAX_RETRIES" => Self::MaxRetries,
            "UNKNOWN_ERROR" => Self::UnknownError,
            "QUEUE_ERROR" => Self::QueueError,
            "FLUSH_TIMEOUT" => Self::FlushTimeout,
            "INVALID_CONFIG" => Self::InvalidConfig,
            "MISSING_RUNTIME" => Self::MissingRuntime,
            other => Self::Remote(other.to_string()),
        }
    }

    /// Whether the same record could succeed if submitted again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::MaxRetries | Self::QueueFull | Self::FlushTimeout)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A tagged delivery failure.
///
/// Whether the failure is terminal is a property of [`ErrorCode`], not of the
/// error value.
#[derive(Debug, Clone, Error, Serialize)]
#[error("XaseError({code}): {message}")]
pub struct DeliveryError {
    /// Failure kind.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// HTTP status of the response that caused the failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Structured context (remote error details, last transport error, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl DeliveryError {
    /// Create an error with a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: None,
            details: None,
        }
    }

    /// Attach the HTTP status code.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Attach structured details.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Wrap a foreign error, recording its Rust type name under
    /// `details.exception`.
    pub fn wrap<E: std::error::Error>(code: ErrorCode, err: &E) -> Self {
        Self::new(code, err.to_string())
            .with_details(json!({ "exception": std::any::type_name::<E>() }))
    }
}

/// Result type alias using DeliveryError.
pub type XaseResult<T> = Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = DeliveryError::new(ErrorCode::QueueClosed, "Queue is closed");
        assert_eq!(err.to_string(), "XaseError(QUEUE_CLOSED): Queue is closed");
    }

    #[test]
    fn known_wire_codes_map_to_variants() {
        assert_eq!(ErrorCode::from_wire("MAX_RETRIES"), ErrorCode::MaxRetries);
        assert_eq!(
            ErrorCode::from_wire("INVALID_IDEMPOTENCY_KEY"),
            ErrorCode::InvalidIdempotencyKey
        );
        assert_eq!(
            ErrorCode::from_wire("UNAUTHORIZED"),
            ErrorCode::Remote("UNAUTHORIZED".to_string())
        );
        assert_eq!(ErrorCode::Remote("FORBIDDEN".into()).as_str(), "FORBIDDEN");
    }

    #[test]
    fn only_transient_codes_are_retryable() {
        assert!(ErrorCode::MaxRetries.is_retryable());
        assert!(ErrorCode::QueueFull.is_retryable());
        assert!(ErrorCode::FlushTimeout.is_retryable());
        assert!(!ErrorCode::RequestFailed.is_retryable());
        assert!(!ErrorCode::InvalidConfidence.is_retryable());
        assert!(!ErrorCode::Remote("VALIDATION_ERROR".into()).is_retryable());
    }

    #[test]
    fn serializes_with_wire_code() {
        let err = DeliveryError::new(ErrorCode::RequestFailed, "Invalid payload")
            .with_status(400)
            .with_details(json!({"field": "input"}));
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "REQUEST_FAILED");
        assert_eq!(value["status_code"], 400);
        assert_eq!(value["details"]["field"], "input");
    }

    #[test]
    fn wrap_records_type_name() {
        let serde_err = serde_json::from_str::<Value>("{{{").unwrap_err();
        let err = DeliveryError::wrap(ErrorCode::UnknownError, &serde_err);
        assert_eq!(err.code, ErrorCode::UnknownError);
        let exception = err.details.unwrap()["exception"].as_str().unwrap().to_string();
        assert!(exception.contains("serde_json"));
    }
}
