//! Fire-and-forget delivery queue.
//!
//! A bounded FIFO of pending records drained by exactly one background task.
//! Producers never wait on the network: `enqueue` is a short critical section
//! that evicts the oldest record when the buffer is full. Hook callbacks,
//! including the `QUEUE_FULL` notice for an evicted record, run only on the
//! worker task.

use crate::error::{DeliveryError, ErrorCode, XaseResult};
use crate::hooks::DeliveryHooks;
use crate::transport::RecordSender;
use crate::types::{DeliveryResult, QueueItem, QueueStats};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// How long the idle worker waits before re-checking for work or closure.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sleep between `flush` progress checks.
const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on how long `close` waits for the worker to exit.
const CLOSE_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Buffer state guarded by a single lock.
#[derive(Default)]
struct Buffer {
    /// Records waiting for delivery, oldest first.
    items: VecDeque<QueueItem>,
    /// Eviction notices waiting to reach the error hook.
    dropped: VecDeque<DeliveryError>,
    /// Work taken by the worker and not yet marked done.
    in_flight: usize,
}

/// Next unit of work for the worker.
enum Work {
    Deliver(QueueItem),
    Dropped(DeliveryError),
}

struct Shared {
    buffer: Mutex<Buffer>,
    wake: Notify,
    closed: AtomicBool,
    max_size: usize,
}

impl Shared {
    fn new(max_size: usize) -> Self {
        Self {
            buffer: Mutex::new(Buffer::default()),
            wake: Notify::new(),
            closed: AtomicBool::new(false),
            max_size,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Pop the next notice or record and mark it in flight, atomically.
    ///
    /// Notices go first so a drop is reported before anything enqueued after it.
    fn take_next(&self) -> Option<Work> {
        let mut buffer = self.buffer.lock();
        let work = if let Some(notice) = buffer.dropped.pop_front() {
            Work::Dropped(notice)
        } else {
            Work::Deliver(buffer.items.pop_front()?)
        };
        buffer.in_flight += 1;
        Some(work)
    }

    /// Take every notice the worker has not dispatched yet.
    fn drain_dropped(&self) -> Vec<DeliveryError> {
        self.buffer.lock().dropped.drain(..).collect()
    }

    fn task_done(&self) {
        let mut buffer = self.buffer.lock();
        buffer.in_flight = buffer.in_flight.saturating_sub(1);
    }

    /// (pending records, undispatched notices, in flight)
    fn snapshot(&self) -> (usize, usize, usize) {
        let buffer = self.buffer.lock();
        (buffer.items.len(), buffer.dropped.len(), buffer.in_flight)
    }
}

/// Bounded in-memory queue with one background delivery worker.
pub struct DeliveryQueue {
    shared: Arc<Shared>,
    hooks: Option<Arc<dyn DeliveryHooks>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryQueue {
    /// Create the queue and spawn its worker on `runtime`.
    pub fn start(
        sender: Arc<dyn RecordSender>,
        max_size: usize,
        hooks: Option<Arc<dyn DeliveryHooks>>,
        runtime: &Handle,
    ) -> Self {
        let shared = Arc::new(Shared::new(max_size));
        let worker = runtime.spawn(run_worker(shared.clone(), sender, hooks.clone()));

        info!(max_size, "Delivery queue started");

        Self {
            shared,
            hooks,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Add a record without waiting on the network.
    ///
    /// When the queue is full the oldest record is dropped and a `QUEUE_FULL`
    /// notice is queued for the error hook. Fails with `QUEUE_CLOSED` after
    /// [`close`](Self::close) and with `QUEUE_FULL` when the capacity is zero.
    pub fn enqueue(&self, item: QueueItem) -> XaseResult<()> {
        {
            let mut buffer = self.shared.buffer.lock();

            if self.shared.is_closed() {
                return Err(DeliveryError::new(ErrorCode::QueueClosed, "Queue is closed"));
            }

            if self.shared.max_size == 0 {
                return Err(DeliveryError::new(ErrorCode::QueueFull, "Queue full")
                    .with_details(json!({ "max_size": 0 })));
            }

            if buffer.items.len() >= self.shared.max_size {
                if let Some(dropped) = buffer.items.pop_front() {
                    warn!(
                        max_size = self.shared.max_size,
                        policy = %dropped.record.policy,
                        "Queue full, dropped oldest record"
                    );
                    buffer
                        .dropped
                        .push_back(eviction_notice(&dropped, self.shared.max_size));
                }
            }

            buffer.items.push_back(item);
            debug!(depth = buffer.items.len(), "Enqueued record");
        }

        self.shared.wake.notify_one();
        Ok(())
    }

    /// Wait until every queued record (and drop notice) has been handled.
    ///
    /// Fails with `FLUSH_TIMEOUT` carrying the number of records still queued.
    /// A timeout too large to represent waits without a deadline.
    pub async fn flush(&self, timeout: Duration) -> XaseResult<()> {
        let deadline = Instant::now().checked_add(timeout);

        loop {
            let (pending, notices, in_flight) = self.shared.snapshot();
            if pending == 0 && notices == 0 && in_flight == 0 {
                return Ok(());
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(pending, in_flight, "Flush timed out");
                return Err(DeliveryError::new(
                    ErrorCode::FlushTimeout,
                    format!("Flush timeout: {} items remaining", pending),
                )
                .with_details(json!({
                    "remaining": pending,
                    "in_flight": in_flight,
                    "pending_notices": notices,
                })));
            }

            tokio::time::sleep(FLUSH_POLL_INTERVAL).await;
        }
    }

    /// Stop accepting records and wait (bounded) for the worker to exit.
    ///
    /// Does not drain: call [`flush`](Self::flush) first for full delivery.
    /// A delivery already in progress is left to finish on its own; pending
    /// drop notices still reach the error hook once it does.
    pub async fn close(&self) {
        {
            let _buffer = self.shared.buffer.lock();
            self.shared.closed.store(true, Ordering::Release);
        }
        self.shared.wake.notify_one();

        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return;
        };

        match tokio::time::timeout(CLOSE_JOIN_TIMEOUT, worker).await {
            Ok(Ok(())) => debug!("Delivery worker joined"),
            Ok(Err(e)) => {
                warn!(error = %e, "Delivery worker ended abnormally");
                report_dropped(&self.shared, self.hooks.as_deref());
            }
            Err(_) => warn!(
                timeout_ms = CLOSE_JOIN_TIMEOUT.as_millis() as u64,
                "Delivery worker still busy at close, detaching"
            ),
        }

        let (pending, notices, _) = self.shared.snapshot();
        if pending > 0 || notices > 0 {
            warn!(pending, notices, "Queue closed with undelivered records");
        }
    }

    /// Current depth and lifecycle flags.
    pub fn get_stats(&self) -> QueueStats {
        let (size, _, in_flight) = self.shared.snapshot();
        QueueStats {
            size,
            in_flight,
            max_size: self.shared.max_size,
            closed: self.shared.is_closed(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for DeliveryQueue {
    fn drop(&mut self) {
        if !self.shared.is_closed() {
            // Let the worker exit instead of polling forever.
            self.shared.closed.store(true, Ordering::Release);
            self.shared.wake.notify_one();
            let (pending, _, _) = self.shared.snapshot();
            if pending > 0 {
                warn!(pending, "Delivery queue dropped without close");
            }
        }

        // A live worker reports notices itself on the way out.
        let worker_gone = self
            .worker
            .get_mut()
            .as_ref()
            .is_some_and(|worker| worker.is_finished());
        if worker_gone {
            report_dropped(&self.shared, self.hooks.as_deref());
        }
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("stats", &self.get_stats())
            .finish()
    }
}

/// Worker loop: deliver records one at a time until the queue is closed.
async fn run_worker(
    shared: Arc<Shared>,
    sender: Arc<dyn RecordSender>,
    hooks: Option<Arc<dyn DeliveryHooks>>,
) {
    info!("Delivery worker started");

    while !shared.is_closed() {
        match shared.take_next() {
            Some(Work::Dropped(notice)) => {
                dispatch_error(hooks.as_deref(), &notice);
                shared.task_done();
            }
            Some(Work::Deliver(item)) => {
                let outcome = AssertUnwindSafe(sender.send(&item)).catch_unwind().await;
                match outcome {
                    Ok(Ok(result)) => dispatch_success(hooks.as_deref(), &result),
                    Ok(Err(err)) => {
                        error!(
                            code = %err.code,
                            status = ?err.status_code,
                            policy = %item.record.policy,
                            error = %err.message,
                            "Queued record delivery failed"
                        );
                        dispatch_error(hooks.as_deref(), &err);
                    }
                    Err(panic) => {
                        let err = panic_error(panic);
                        error!(error = %err.message, "Queued record delivery panicked");
                        dispatch_error(hooks.as_deref(), &err);
                    }
                }
                shared.task_done();
            }
            None => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = tokio::time::sleep(WORKER_POLL_INTERVAL) => {}
                }
            }
        }
    }

    // Closing never discards an eviction that happened before it.
    report_dropped(&shared, hooks.as_deref());

    info!("Delivery worker stopped");
}

fn report_dropped(shared: &Shared, hooks: Option<&dyn DeliveryHooks>) {
    for notice in shared.drain_dropped() {
        dispatch_error(hooks, &notice);
    }
}

fn dispatch_success(hooks: Option<&dyn DeliveryHooks>, result: &DeliveryResult) {
    let Some(hooks) = hooks else {
        return;
    };
    if std::panic::catch_unwind(AssertUnwindSafe(|| hooks.on_success(result))).is_err() {
        warn!("on_success hook panicked");
    }
}

fn dispatch_error(hooks: Option<&dyn DeliveryHooks>, err: &DeliveryError) {
    let Some(hooks) = hooks else {
        return;
    };
    if std::panic::catch_unwind(AssertUnwindSafe(|| hooks.on_error(err))).is_err() {
        warn!(code = %err.code, "on_error hook panicked");
    }
}

/// `QUEUE_FULL` notice describing an evicted record (not its payload).
fn eviction_notice(dropped: &QueueItem, max_size: usize) -> DeliveryError {
    DeliveryError::new(ErrorCode::QueueFull, "Queue full, item dropped").with_details(json!({
        "max_size": max_size,
        "policy": dropped.record.policy,
        "transaction_id": dropped.record.transaction_id,
        "idempotency_key": dropped.idempotency_key,
    }))
}

/// `QUEUE_ERROR` for a delivery that panicked instead of returning an error.
fn panic_error(panic: Box<dyn Any + Send>) -> DeliveryError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "delivery panicked".to_string());

    DeliveryError::new(ErrorCode::QueueError, message.clone())
        .with_details(json!({ "exception": "panic", "message": message }))
}
