//! Delivery queue scenarios driven by an in-process sender.
//!
//! Covers:
//! - FIFO delivery with success and error hooks
//! - Drop-oldest overflow and its `QUEUE_FULL` notice
//! - Panics in the sender or in hooks
//! - flush / close lifecycle, including notices pending at close

use super::harness::{
    queue_item, wait_until, HookEvent, PanickingHooks, RecordingHooks, ScriptedSender,
    SendOutcome,
};
use crate::error::{DeliveryError, ErrorCode};
use crate::queue::DeliveryQueue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

fn start(
    sender: &Arc<ScriptedSender>,
    max_size: usize,
    hooks: &Arc<RecordingHooks>,
) -> DeliveryQueue {
    DeliveryQueue::start(
        sender.clone(),
        max_size,
        Some(hooks.clone()),
        &Handle::current(),
    )
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn delivers_in_fifo_order() {
    let sender = Arc::new(ScriptedSender::new());
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 10, &hooks);

    for policy in ["a", "b", "c"] {
        queue.enqueue(queue_item(policy)).unwrap();
    }
    queue.flush(Duration::from_secs(2)).await.unwrap();

    assert_eq!(sender.delivered_policies(), vec!["a", "b", "c"]);
    assert_eq!(hooks.successes().len(), 3);
    assert!(hooks.errors().is_empty());

    queue.close().await;
}

#[tokio::test]
async fn failed_delivery_goes_to_error_hook_once() {
    let sender = Arc::new(ScriptedSender::new());
    sender.push(SendOutcome::Fail(DeliveryError::new(
        ErrorCode::MaxRetries,
        "Max retries exceeded: HTTP 503",
    )));
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 10, &hooks);

    queue.enqueue(queue_item("a")).unwrap();
    queue.enqueue(queue_item("b")).unwrap();
    queue.flush(Duration::from_secs(2)).await.unwrap();

    // Never re-enqueued: one attempt per item.
    assert_eq!(sender.started(), 2);
    let errors = hooks.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::MaxRetries);
    assert_eq!(hooks.successes().len(), 1);

    queue.close().await;
}

#[tokio::test]
async fn sender_panic_is_reported_as_queue_error() {
    let sender = Arc::new(ScriptedSender::new());
    sender.push(SendOutcome::Panic("transport exploded"));
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 10, &hooks);

    queue.enqueue(queue_item("a")).unwrap();
    queue.enqueue(queue_item("b")).unwrap();
    queue.flush(Duration::from_secs(2)).await.unwrap();

    let errors = hooks.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::QueueError);
    assert_eq!(errors[0].message, "transport exploded");
    assert_eq!(errors[0].details.as_ref().unwrap()["exception"], "panic");

    // The worker survived and delivered the next item.
    assert_eq!(hooks.successes().len(), 1);
    assert_eq!(sender.delivered_policies(), vec!["a", "b"]);

    queue.close().await;
}

#[tokio::test]
async fn panicking_hooks_do_not_stop_the_worker() {
    let sender = Arc::new(ScriptedSender::new());
    sender.push(SendOutcome::Fail(DeliveryError::new(ErrorCode::RequestFailed, "nope")));
    let queue = DeliveryQueue::start(
        sender.clone(),
        10,
        Some(Arc::new(PanickingHooks)),
        &Handle::current(),
    );

    for policy in ["a", "b", "c"] {
        queue.enqueue(queue_item(policy)).unwrap();
    }
    queue.flush(Duration::from_secs(2)).await.unwrap();

    assert_eq!(sender.started(), 3);
    queue.close().await;
}

#[tokio::test]
async fn works_without_hooks() {
    let sender = Arc::new(ScriptedSender::new());
    let queue = DeliveryQueue::start(sender.clone(), 10, None, &Handle::current());

    queue.enqueue(queue_item("a")).unwrap();
    queue.flush(Duration::from_secs(2)).await.unwrap();

    assert_eq!(sender.started(), 1);
    queue.close().await;
}

// =============================================================================
// Overflow
// =============================================================================

#[tokio::test]
async fn overflow_drops_oldest_waiting_item() {
    let (sender, gate) = ScriptedSender::gated();
    let sender = Arc::new(sender);
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 1, &hooks);

    let mut a = queue_item("a");
    a.record.transaction_id = Some("txn_a".into());
    queue.enqueue(a).unwrap();
    sender.wait_started(1).await;

    // A is in flight; B waits and is evicted by C.
    let mut b = queue_item("b");
    b.record.transaction_id = Some("txn_b".into());
    queue.enqueue(b).unwrap();
    queue.enqueue(queue_item("c")).unwrap();
    assert_eq!(queue.get_stats().size, 1);

    gate.add_permits(10);
    queue.flush(Duration::from_secs(2)).await.unwrap();

    assert_eq!(sender.delivered_policies(), vec!["a", "c"]);

    let errors = hooks.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::QueueFull);
    let details = errors[0].details.as_ref().unwrap();
    assert_eq!(details["policy"], "b");
    assert_eq!(details["transaction_id"], "txn_b");
    assert_eq!(details["max_size"], 1);

    queue.close().await;
}

#[tokio::test]
async fn eviction_notice_fires_before_later_deliveries() {
    let (sender, gate) = ScriptedSender::gated();
    let sender = Arc::new(sender);
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 1, &hooks);

    queue.enqueue(queue_item("a")).unwrap();
    sender.wait_started(1).await;
    queue.enqueue(queue_item("b")).unwrap();
    queue.enqueue(queue_item("c")).unwrap();

    gate.add_permits(10);
    queue.flush(Duration::from_secs(2)).await.unwrap();

    let kinds: Vec<&str> = hooks
        .events()
        .iter()
        .map(|event| match event {
            HookEvent::Success(_) => "success",
            HookEvent::Error(_) => "error",
        })
        .collect();
    assert_eq!(kinds, vec!["success", "error", "success"]);

    queue.close().await;
}

#[tokio::test]
async fn evicted_item_is_never_delivered() {
    let (sender, gate) = ScriptedSender::gated();
    let sender = Arc::new(sender);
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 1, &hooks);

    // No synchronization: the worker may or may not have taken A yet.
    queue.enqueue(queue_item("a")).unwrap();
    queue.enqueue(queue_item("b")).unwrap();

    gate.add_permits(10);
    queue.flush(Duration::from_secs(2)).await.unwrap();

    let delivered = sender.delivered_policies();
    let dropped: Vec<String> = hooks
        .errors()
        .iter()
        .filter(|err| err.code == ErrorCode::QueueFull)
        .map(|err| err.details.as_ref().unwrap()["policy"].as_str().unwrap().to_string())
        .collect();

    if delivered == vec!["b"] {
        assert_eq!(dropped, vec!["a"]);
    } else {
        assert_eq!(delivered, vec!["a", "b"]);
        assert!(dropped.is_empty());
    }
    // The new item is never the one reported as dropped.
    assert!(!dropped.contains(&"b".to_string()));

    queue.close().await;
}

#[tokio::test]
async fn zero_capacity_rejects_everything() {
    let sender = Arc::new(ScriptedSender::new());
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 0, &hooks);

    let err = queue.enqueue(queue_item("a")).unwrap_err();
    assert_eq!(err.code, ErrorCode::QueueFull);
    assert_eq!(sender.started(), 0);

    queue.close().await;
}

#[tokio::test]
async fn eviction_is_reported_when_closed_mid_delivery() {
    let (sender, gate) = ScriptedSender::gated();
    let sender = Arc::new(sender);
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 1, &hooks);

    queue.enqueue(queue_item("a")).unwrap();
    sender.wait_started(1).await;
    queue.enqueue(queue_item("b")).unwrap();
    queue.enqueue(queue_item("c")).unwrap();

    // A finishes only after close has set the closed flag.
    let opener = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        gate.add_permits(1);
    });
    queue.close().await;
    opener.await.unwrap();

    assert_eq!(sender.delivered_policies(), vec!["a"]);
    let errors = hooks.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::QueueFull);
    assert_eq!(errors[0].details.as_ref().unwrap()["policy"], "b");
    assert_eq!(queue.get_stats().size, 1);
}

#[tokio::test]
async fn eviction_is_reported_after_queue_is_dropped() {
    let (sender, gate) = ScriptedSender::gated();
    let sender = Arc::new(sender);
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 1, &hooks);

    queue.enqueue(queue_item("a")).unwrap();
    sender.wait_started(1).await;
    queue.enqueue(queue_item("b")).unwrap();
    queue.enqueue(queue_item("c")).unwrap();
    drop(queue);

    gate.add_permits(10);
    let reported = wait_until(Duration::from_secs(2), || {
        hooks.errors().iter().any(|err| err.code == ErrorCode::QueueFull)
    })
    .await;

    assert!(reported, "eviction of b never reached the error hook");
    assert_eq!(sender.delivered_policies(), vec!["a"]);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn flush_without_deadline_does_not_overflow() {
    let sender = Arc::new(ScriptedSender::new());
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 10, &hooks);

    queue.flush(Duration::MAX).await.unwrap();

    queue.enqueue(queue_item("a")).unwrap();
    queue.flush(Duration::MAX).await.unwrap();
    assert_eq!(sender.delivered_policies(), vec!["a"]);

    queue.close().await;
}

#[tokio::test]
async fn flush_on_empty_queue_returns_immediately() {
    let sender = Arc::new(ScriptedSender::new());
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 10, &hooks);

    let start = Instant::now();
    queue.flush(Duration::from_secs(5)).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));

    queue.close().await;
}

#[tokio::test]
async fn flush_timeout_reports_remaining_count() {
    let (sender, gate) = ScriptedSender::gated();
    let sender = Arc::new(sender);
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 10, &hooks);

    for policy in ["a", "b", "c"] {
        queue.enqueue(queue_item(policy)).unwrap();
    }
    sender.wait_started(1).await;

    let err = queue.flush(Duration::from_millis(150)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::FlushTimeout);
    assert_eq!(err.message, "Flush timeout: 2 items remaining");
    let details = err.details.unwrap();
    assert_eq!(details["remaining"], 2);
    assert_eq!(details["in_flight"], 1);

    let stats = queue.get_stats();
    assert_eq!(stats.size, 2);
    assert_eq!(stats.in_flight, 1);
    assert_eq!(stats.max_size, 10);
    assert!(!stats.closed);

    gate.add_permits(10);
    queue.flush(Duration::from_secs(2)).await.unwrap();
    assert_eq!(hooks.successes().len(), 3);

    queue.close().await;
}

#[tokio::test]
async fn closed_queue_rejects_enqueue() {
    let sender = Arc::new(ScriptedSender::new());
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 10, &hooks);

    queue.close().await;

    let err = queue.enqueue(queue_item("late")).unwrap_err();
    assert_eq!(err.code, ErrorCode::QueueClosed);
    assert!(queue.get_stats().closed);
    assert!(queue.is_closed());

    // Closing twice is harmless.
    queue.close().await;
}

#[tokio::test]
async fn close_does_not_drain() {
    let (sender, gate) = ScriptedSender::gated();
    let sender = Arc::new(sender);
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 10, &hooks);

    queue.enqueue(queue_item("a")).unwrap();
    queue.enqueue(queue_item("b")).unwrap();
    sender.wait_started(1).await;

    // Let A finish while close is waiting for the worker.
    gate.add_permits(1);
    queue.close().await;

    assert_eq!(sender.started(), 1);
    assert_eq!(queue.get_stats().size, 1);
}

#[tokio::test]
async fn close_is_bounded_when_worker_is_stuck() {
    let (sender, _gate) = ScriptedSender::gated();
    let sender = Arc::new(sender);
    let hooks = RecordingHooks::new();
    let queue = start(&sender, 10, &hooks);

    queue.enqueue(queue_item("stuck")).unwrap();
    sender.wait_started(1).await;

    let start = Instant::now();
    queue.close().await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(1500), "close returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "close not bounded: {elapsed:?}");
    assert!(queue.get_stats().closed);
}
