//! Host callbacks for fire-and-forget outcomes.

use crate::error::DeliveryError;
use crate::types::DeliveryResult;

/// Receives the outcome of queued deliveries.
///
/// Called only from the delivery worker, one item at a time. Implementations
/// should return quickly; a slow hook delays the next delivery.
pub trait DeliveryHooks: Send + Sync {
    /// A queued record was stored by the service.
    fn on_success(&self, _result: &DeliveryResult) {}

    /// A queued record failed, or was dropped to make room (`QUEUE_FULL`).
    fn on_error(&self, _error: &DeliveryError) {}
}
