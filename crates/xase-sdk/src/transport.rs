//! HTTP transport for record delivery with retry.
//!
//! One logical POST to `{base_url}/records`. Responses are classified per
//! attempt: 2xx is parsed as a [`DeliveryResult`], 429 and 5xx and
//! timeout/connect failures are retried with exponential backoff, other 4xx
//! fail immediately.

use crate::error::{DeliveryError, ErrorCode, XaseResult};
use crate::types::{DeliveryResult, JsonMap, QueueItem, Record};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Endpoint path appended to the base URL.
pub const RECORDS_PATH: &str = "/records";

/// Jitter applied around the capped backoff delay (±25%).
const JITTER_RATIO: f64 = 0.25;

/// Delivers one record, with whatever retry policy the implementation owns.
///
/// The delivery queue drives this trait, so tests and hosts can substitute
/// their own sender.
#[async_trait]
pub trait RecordSender: Send + Sync {
    /// Deliver the item's record, honoring its idempotency key and timeout.
    async fn send(&self, item: &QueueItem) -> XaseResult<DeliveryResult>;
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay for attempt 0.
    pub base_delay: Duration,
    /// Cap applied before jitter.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// `min(base_delay * 2^attempt, max_delay)`, without jitter.
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let multiplier = 1u128 << attempt.min(64);
        let nanos = self
            .base_delay
            .as_nanos()
            .saturating_mul(multiplier)
            .min(self.max_delay.as_nanos());
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Capped delay with uniform ±25% jitter, never negative.
    ///
    /// Saturates at the cap when the jittered value is not representable.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay(attempt);
        let delay = capped.as_secs_f64();
        let jitter = delay * JITTER_RATIO * rand::thread_rng().gen_range(-1.0f64..=1.0);
        Duration::try_from_secs_f64((delay + jitter).max(0.0)).unwrap_or(capped)
    }
}

/// Request body in the service's wire schema.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordBody<'a> {
    input: &'a JsonMap,
    output: &'a JsonMap,
    context: Option<&'a JsonMap>,
    policy_id: &'a str,
    policy_version: Option<&'a str>,
    decision_type: Option<&'a str>,
    confidence: Option<f64>,
    processing_time: Option<f64>,
    store_payload: Option<bool>,
}

impl<'a> From<&'a Record> for RecordBody<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            input: &record.input,
            output: &record.output,
            context: record.context.as_ref(),
            policy_id: &record.policy,
            policy_version: record.policy_version.as_deref(),
            decision_type: record.decision_type.as_deref(),
            confidence: record.confidence,
            processing_time: record.processing_time,
            store_payload: record.store_payload,
        }
    }
}

/// Error body returned by the service on rejection.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<Value>,
}

/// Outcome of a single attempt.
enum Attempt {
    Delivered(DeliveryResult),
    Fatal(DeliveryError),
    Retry {
        /// Server-requested delay (`Retry-After`), used instead of backoff.
        retry_after: Option<Duration>,
        status: Option<u16>,
        reason: String,
    },
}

/// HTTP transport for the records endpoint.
pub struct HttpTransport {
    client: Client,
    records_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl HttpTransport {
    /// Create a transport for `base_url` (no trailing slash).
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> XaseResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::wrap(ErrorCode::InvalidConfig, &e))?;

        Ok(Self {
            client,
            records_url: format!("{}{}", base_url, RECORDS_PATH),
            api_key: api_key.to_string(),
            policy,
        })
    }

    /// Full URL records are posted to.
    pub fn records_url(&self) -> &str {
        &self.records_url
    }

    /// Deliver a record, retrying transient failures.
    ///
    /// Sleeps between attempts on the calling task.
    pub async fn post_record(&self, item: &QueueItem) -> XaseResult<DeliveryResult> {
        let body = RecordBody::from(&item.record);
        let max_retries = self.policy.max_retries;
        let mut last_status: Option<u16> = None;
        let mut last_reason = String::new();

        for attempt in 0..=max_retries {
            debug!(
                url = %self.records_url,
                attempt,
                policy = %item.record.policy,
                idempotent = item.idempotency_key.is_some(),
                "Posting record"
            );

            match self.attempt(&body, item).await {
                Attempt::Delivered(result) => {
                    debug!(
                        transaction_id = %result.transaction_id,
                        attempt,
                        "Record delivered"
                    );
                    return Ok(result);
                }
                Attempt::Fatal(err) => return Err(err),
                Attempt::Retry {
                    retry_after,
                    status,
                    reason,
                } => {
                    if attempt < max_retries {
                        let delay =
                            retry_after.unwrap_or_else(|| self.policy.backoff_delay(attempt));
                        warn!(
                            attempt,
                            status = ?status,
                            delay_ms = delay.as_millis() as u64,
                            error = %reason,
                            "Record delivery failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_status = status;
                    last_reason = reason;
                }
            }
        }

        let attempts = u64::from(max_retries) + 1;
        let mut err = DeliveryError::new(
            ErrorCode::MaxRetries,
            format!("Max retries exceeded: {}", last_reason),
        )
        .with_details(json!({ "last_error": last_reason, "attempts": attempts }));
        if let Some(status) = last_status {
            err = err.with_status(status);
        }
        Err(err)
    }

    /// Perform one POST and classify the result.
    async fn attempt(&self, body: &RecordBody<'_>, item: &QueueItem) -> Attempt {
        let mut request = self
            .client
            .post(&self.records_url)
            .header("Content-Type", "application/json")
            .header("X-API-Key", &self.api_key)
            .json(body);
        if let Some(key) = &item.idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        if let Some(timeout) = item.timeout {
            request = request.timeout(timeout);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return Attempt::Retry {
                    retry_after: None,
                    status: None,
                    reason: e.to_string(),
                };
            }
            Err(e) => return Attempt::Fatal(DeliveryError::wrap(ErrorCode::UnknownError, &e)),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<DeliveryResult>().await {
                Ok(result) => Attempt::Delivered(result),
                Err(e) if e.is_timeout() => Attempt::Retry {
                    retry_after: None,
                    status: None,
                    reason: e.to_string(),
                },
                Err(e) => Attempt::Fatal(DeliveryError::wrap(ErrorCode::UnknownError, &e)),
            };
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            return Attempt::Retry {
                retry_after,
                status: Some(status.as_u16()),
                reason: format!("HTTP {}", status),
            };
        }

        if status.as_u16() >= 500 {
            return Attempt::Retry {
                retry_after: None,
                status: Some(status.as_u16()),
                reason: format!("HTTP {}", status),
            };
        }

        Attempt::Fatal(rejection_error(status, response).await)
    }
}

#[async_trait]
impl RecordSender for HttpTransport {
    async fn send(&self, item: &QueueItem) -> XaseResult<DeliveryResult> {
        self.post_record(item).await
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("records_url", &self.records_url)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// `Retry-After` in (possibly fractional) seconds. HTTP-date values are not
/// supported and fall back to backoff.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

/// Build the non-retryable error for a rejected request.
async fn rejection_error(status: StatusCode, response: Response) -> DeliveryError {
    let text = response.text().await.unwrap_or_default();
    let (body, raw) = if text.trim().is_empty() {
        (ErrorBody::default(), None)
    } else {
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body, None),
            Err(_) => (ErrorBody::default(), Some(text)),
        }
    };

    let code = body
        .code
        .as_deref()
        .map(ErrorCode::from_wire)
        .unwrap_or(ErrorCode::RequestFailed);
    let message = body.error.unwrap_or_else(|| "Request failed".to_string());

    warn!(status = status.as_u16(), code = %code, "Record rejected");

    let mut err = DeliveryError::new(code, message).with_status(status.as_u16());
    match (body.details, raw) {
        (Some(details), _) => err = err.with_details(details),
        (None, Some(raw)) => err = err.with_details(json!({ "body": raw })),
        (None, None) => {}
    }
    err
}
