//! Data model shared by the client, queue, and transport.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Keyed JSON map used for record input, output, and context.
pub type JsonMap = Map<String, Value>;

/// An AI decision submitted as evidence.
///
/// Built by the caller, moved into the client on `record`, and owned by the
/// queue while it waits for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Policy or model identifier (e.g. `credit_policy_v4`).
    pub policy: String,
    /// Input data the decision was made on.
    pub input: JsonMap,
    /// Decision output.
    pub output: JsonMap,
    /// Model confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Extra context, merged over the captured runtime context.
    #[serde(default)]
    pub context: Option<JsonMap>,
    /// Caller transaction ID; also seeds the idempotency key.
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub policy_version: Option<String>,
    #[serde(default)]
    pub decision_type: Option<String>,
    /// Processing time in milliseconds.
    #[serde(default)]
    pub processing_time: Option<f64>,
    /// Ask the service to keep the full payload.
    #[serde(default)]
    pub store_payload: Option<bool>,
}

impl Record {
    /// Create a record with the required fields.
    pub fn new(policy: impl Into<String>, input: JsonMap, output: JsonMap) -> Self {
        Self {
            policy: policy.into(),
            input,
            output,
            confidence: None,
            context: None,
            transaction_id: None,
            policy_version: None,
            decision_type: None,
            processing_time: None,
            store_payload: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_context(mut self, context: JsonMap) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_policy_version(mut self, policy_version: impl Into<String>) -> Self {
        self.policy_version = Some(policy_version.into());
        self
    }

    pub fn with_decision_type(mut self, decision_type: impl Into<String>) -> Self {
        self.decision_type = Some(decision_type.into());
        self
    }

    pub fn with_processing_time(mut self, processing_time_ms: f64) -> Self {
        self.processing_time = Some(processing_time_ms);
        self
    }

    pub fn with_store_payload(mut self, store_payload: bool) -> Self {
        self.store_payload = Some(store_payload);
        self
    }
}

/// Where the record landed in the tenant's hash chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainPosition {
    /// First record in the chain.
    Genesis,
    /// Linked to a previous record.
    Chained,
}

/// Acknowledgment returned by the service for a stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    #[serde(default = "default_success")]
    pub success: bool,
    pub transaction_id: String,
    pub receipt_url: String,
    pub timestamp: String,
    pub record_hash: String,
    pub chain_position: ChainPosition,
}

fn default_success() -> bool {
    true
}

/// Per-call options for `XaseClient::record`.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    /// Explicit idempotency key; overrides the one derived from `transaction_id`.
    pub idempotency_key: Option<String>,
    /// Deliver synchronously even when fire-and-forget is enabled.
    pub skip_queue: bool,
    /// Request timeout for this record only.
    pub timeout: Option<Duration>,
}

impl RecordOptions {
    /// Options that force synchronous delivery.
    pub fn sync() -> Self {
        Self {
            skip_queue: true,
            ..Default::default()
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A record waiting in the delivery queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub record: Record,
    pub idempotency_key: Option<String>,
    /// Request timeout override carried from [`RecordOptions`].
    pub timeout: Option<Duration>,
}

impl QueueItem {
    pub fn new(record: Record, idempotency_key: Option<String>) -> Self {
        Self {
            record,
            idempotency_key,
            timeout: None,
        }
    }
}

/// Point-in-time view of the delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Records waiting for the worker.
    pub size: usize,
    /// Records (or drop notices) the worker is handling right now.
    pub in_flight: usize,
    pub max_size: usize,
    pub closed: bool,
}
