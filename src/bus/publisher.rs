//! Publishing side of the bus.

use std::time::Duration;

use thiserror::Error;

use super::message::Message;

/// Error type for publish operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The bus did not confirm the publish within the timeout.
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
    /// The bus could not be reached.
    #[error("bus unavailable: {0}")]
    Unavailable(String),
    /// The bus refused the message (for example, an undeclared exchange).
    #[error("message rejected: {0}")]
    Rejected(String),
    /// Internal state lock was poisoned.
    #[error("bus lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl PublishError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::Timeout(_) => "timeout",
            PublishError::Unavailable(_) => "unavailable",
            PublishError::Rejected(_) => "rejected",
            PublishError::LockPoisoned(_) => "lock_poisoned",
        }
    }
}

/// Trait for publishing messages to an exchange.
///
/// Implementations must give up after `timeout` and report
/// [`PublishError::Timeout`] rather than block the caller indefinitely.
pub trait Publisher: Send + Sync {
    /// Publish one message to `exchange` under the message's routing key.
    fn publish(&self, exchange: &str, message: Message, timeout: Duration) -> Result<(), PublishError>;
}
