//! Client facade: validation, enrichment, and routing.

use crate::config::ClientConfig;
use crate::context::{capture_context, merge_context};
use crate::error::{DeliveryError, ErrorCode, XaseResult};
use crate::idempotency::{generate_idempotency_key, is_valid_idempotency_key};
use crate::queue::DeliveryQueue;
use crate::transport::{HttpTransport, RecordSender, RetryPolicy};
use crate::types::{DeliveryResult, QueueItem, QueueStats, Record, RecordOptions};
use crate::validation::validate_record;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Flush budget used by [`XaseClient::close`].
pub const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Entry point for recording AI decisions.
///
/// In fire-and-forget mode (the default) `record` queues the record and
/// returns `Ok(None)` without touching the network; a background task on the
/// current Tokio runtime delivers it and reports through the configured hooks.
/// Otherwise, or with [`RecordOptions::skip_queue`], the record is delivered
/// before `record` returns and the receipt is handed back directly.
///
/// Shutdown is explicit: call [`close`](Self::close) (or [`flush`](Self::flush)
/// then `close`) before the process exits.
pub struct XaseClient {
    sender: Arc<dyn RecordSender>,
    queue: Option<DeliveryQueue>,
}

impl XaseClient {
    /// Build a client that talks HTTP to the configured service.
    ///
    /// Fails with `MISSING_API_KEY`, `INVALID_CONFIG`, or, when
    /// fire-and-forget is enabled outside a Tokio runtime, `MISSING_RUNTIME`.
    pub fn new(config: ClientConfig) -> XaseResult<Self> {
        let api_key = config.require_api_key()?;
        let base_url = config.resolve_base_url()?;
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        };
        let transport = HttpTransport::new(&base_url, api_key, config.timeout, policy)?;

        info!(
            records_url = %transport.records_url(),
            fire_and_forget = config.fire_and_forget,
            max_retries = config.max_retries,
            "Xase client configured"
        );

        Self::with_sender(Arc::new(transport), &config)
    }

    /// Build a client around a custom sender.
    ///
    /// Only the routing settings of `config` (`fire_and_forget`,
    /// `queue_max_size`, `hooks`) are used.
    pub fn with_sender(sender: Arc<dyn RecordSender>, config: &ClientConfig) -> XaseResult<Self> {
        let queue = if config.fire_and_forget {
            let runtime = Handle::try_current()
                .map_err(|e| DeliveryError::wrap(ErrorCode::MissingRuntime, &e))?;
            Some(DeliveryQueue::start(
                sender.clone(),
                config.queue_max_size,
                config.hooks.clone(),
                &runtime,
            ))
        } else {
            None
        };

        Ok(Self { sender, queue })
    }

    /// Record a decision.
    ///
    /// Validation and idempotency-key errors are returned before any I/O.
    /// Returns `Ok(None)` when the record was queued and `Ok(Some(receipt))`
    /// when it was delivered synchronously.
    pub async fn record(
        &self,
        record: Record,
        options: RecordOptions,
    ) -> XaseResult<Option<DeliveryResult>> {
        let item = prepare(record, &options)?;

        match &self.queue {
            Some(queue) if !options.skip_queue => {
                queue.enqueue(item)?;
                Ok(None)
            }
            _ => {
                debug!(policy = %item.record.policy, "Delivering record synchronously");
                self.sender.send(&item).await.map(Some)
            }
        }
    }

    /// Wait for queued records to be delivered. No-op in synchronous mode.
    pub async fn flush(&self, timeout: Duration) -> XaseResult<()> {
        match &self.queue {
            Some(queue) => queue.flush(timeout).await,
            None => Ok(()),
        }
    }

    /// Flush for up to two seconds, then close the queue.
    ///
    /// The queue is closed even if the flush times out; the flush error is
    /// returned afterwards.
    pub async fn close(&self) -> XaseResult<()> {
        let Some(queue) = &self.queue else {
            return Ok(());
        };

        let flushed = queue.flush(CLOSE_FLUSH_TIMEOUT).await;
        queue.close().await;
        info!(clean = flushed.is_ok(), "Xase client closed");
        flushed
    }

    /// Queue statistics, or `None` in synchronous mode.
    pub fn get_stats(&self) -> Option<QueueStats> {
        self.queue.as_ref().map(DeliveryQueue::get_stats)
    }

    pub fn is_fire_and_forget(&self) -> bool {
        self.queue.is_some()
    }
}

impl std::fmt::Debug for XaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XaseClient")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Validate, enrich, and key a record for delivery.
fn prepare(mut record: Record, options: &RecordOptions) -> XaseResult<QueueItem> {
    validate_record(&record)?;

    record.context = Some(merge_context(capture_context(), record.context.as_ref()));

    let idempotency_key = options
        .idempotency_key
        .clone()
        .or_else(|| record.transaction_id.as_deref().map(generate_idempotency_key));

    if let Some(key) = &idempotency_key {
        if !is_valid_idempotency_key(key) {
            return Err(DeliveryError::new(
                ErrorCode::InvalidIdempotencyKey,
                "Idempotency key must be a UUID v4 or 16-64 alphanumeric characters",
            ));
        }
    }

    Ok(QueueItem {
        record,
        idempotency_key,
        timeout: options.timeout,
    })
}
