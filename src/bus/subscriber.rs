//! Consuming side of the bus.

use std::time::Duration;

use thiserror::Error;

use super::message::Delivery;

/// Error type for receive and settle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    #[error("queue '{0}' is not declared")]
    QueueNotFound(String),
    #[error("unknown delivery tag {0}")]
    UnknownDeliveryTag(u64),
    #[error("bus unavailable: {0}")]
    Unavailable(String),
    #[error("bus lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

/// Trait for pulling deliveries from a named queue.
///
/// Each message on a queue goes to exactly one receiver (competing
/// consumers). A delivery stays unacknowledged until it is settled with
/// [`ack`](Subscriber::ack) or [`nack`](Subscriber::nack).
pub trait Subscriber: Send + Sync {
    /// Wait up to `timeout` for the next delivery on `queue`.
    fn receive(&self, queue: &str, timeout: Duration) -> Result<Option<Delivery>, ReceiveError>;

    /// Acknowledge a delivery; the bus forgets the message.
    fn ack(&self, delivery_tag: u64) -> Result<(), ReceiveError>;

    /// Reject a delivery. With `requeue` the message goes back to the queue
    /// for redelivery, otherwise it is dead-lettered or discarded.
    fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), ReceiveError>;
}
