//! Scenario tests for the SDK.
//!
//! - `harness.rs`   - stub HTTP server, scripted sender, recording hooks
//! - `transport.rs` - wire format, retry classification, backoff and Retry-After
//! - `queue.rs`     - FIFO delivery, drop-oldest overflow, flush and close
//! - `client.rs`    - routing between synchronous and fire-and-forget delivery

mod queue;
