//! Xase SDK: record AI decisions as immutable evidence.
//!
//! A [`Record`] describes one decision (policy, input, output, confidence).
//! [`XaseClient::record`] validates it, enriches it with runtime context,
//! derives an idempotency key, and either delivers it over HTTP or hands it to
//! a bounded background queue so the caller pays no network latency.
//!
//! # Delivery Guarantees
//!
//! 1. **Validated locally**: malformed records fail before any I/O
//! 2. **Bounded retries**: 429, 5xx, timeouts and connect failures retry with
//!    jittered exponential backoff; other 4xx fail at once
//! 3. **Never blocks on the queue**: a full queue drops its oldest record and
//!    reports `QUEUE_FULL` through the error hook
//! 4. **Single worker**: queued records are delivered one at a time, in order,
//!    and never re-delivered after a failure
//!
//! # Architecture
//!
//! ```text
//! record() -> validate -> context -> idempotency key
//!                                      |
//!               sync: HttpTransport <--+--> async: DeliveryQueue -> worker -> HttpTransport
//!                                                                   |
//!                                                             DeliveryHooks
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
pub mod idempotency;
pub mod queue;
pub mod transport;
pub mod types;
pub mod validation;

#[cfg(test)]
mod tests;

pub use client::XaseClient;
pub use config::ClientConfig;
pub use context::capture_context;
pub use error::{DeliveryError, ErrorCode, XaseResult};
pub use hooks::DeliveryHooks;
pub use idempotency::{generate_idempotency_key, is_valid_idempotency_key};
pub use queue::DeliveryQueue;
pub use transport::{HttpTransport, RecordSender, RetryPolicy};
pub use types::{
    ChainPosition, DeliveryResult, JsonMap, QueueItem, QueueStats, Record, RecordOptions,
};
pub use validation::validate_record;
