use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::handler::HandlerError;

/// What the consumer does with a delivery whose handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and acknowledge; the message is gone.
    #[default]
    LogAndDrop,
    /// Requeue a retryable failure once; reject it on the second failure.
    RequeueOnce,
    /// Reject without requeue so the bus dead-letters the message.
    DeadLetter,
}

/// How a delivery is settled with the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Requeue,
    Reject,
}

impl FailurePolicy {
    /// Settlement for a delivery whose handler returned `error`.
    pub fn settlement(&self, error: &HandlerError, redelivered: bool) -> Settlement {
        match (self, error) {
            (FailurePolicy::LogAndDrop, _) => Settlement::Ack,
            (FailurePolicy::RequeueOnce, HandlerError::Retryable(_)) if !redelivered => {
                Settlement::Requeue
            }
            (FailurePolicy::RequeueOnce, _) => Settlement::Reject,
            (FailurePolicy::DeadLetter, _) => Settlement::Reject,
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::LogAndDrop => write!(f, "log_and_drop"),
            FailurePolicy::RequeueOnce => write!(f, "requeue_once"),
            FailurePolicy::DeadLetter => write!(f, "dead_letter"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "log_and_drop" | "drop" => Ok(FailurePolicy::LogAndDrop),
            "requeue_once" | "requeue" => Ok(FailurePolicy::RequeueOnce),
            "dead_letter" => Ok(FailurePolicy::DeadLetter),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}
