//! Message handlers and their typed outcome.

use thiserror::Error;
use tracing::info;

use crate::bus::Delivery;

/// Why a handler could not process a delivery.
///
/// The variant decides what happens to the message under the consumer's
/// [`FailurePolicy`](super::FailurePolicy).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Processing may succeed if the message is delivered again.
    #[error("retryable: {0}")]
    Retryable(String),
    /// The message can never be processed; it is not requeued.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl HandlerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Retryable(_))
    }
}

pub type HandlerResult = Result<(), HandlerError>;

/// Reacts to one delivery at a time.
///
/// Handlers run on the consumer's worker threads and may be invoked
/// concurrently when the consumer's concurrency is above one.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, delivery: &Delivery) -> HandlerResult;
}

impl<F> MessageHandler for F
where
    F: Fn(&Delivery) -> HandlerResult + Send + Sync,
{
    fn handle(&self, delivery: &Delivery) -> HandlerResult {
        self(delivery)
    }
}

/// Logs every visit notification it receives.
///
/// This is what the customers service does with `visit-info` today: note
/// that a visit happened, keyed by the trace header.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisitInfoLogger;

impl MessageHandler for VisitInfoLogger {
    fn handle(&self, delivery: &Delivery) -> HandlerResult {
        let text = delivery
            .payload_str()
            .ok_or_else(|| HandlerError::Fatal("payload is not UTF-8".into()))?;
        info!(
            trace_id = delivery.trace_id().unwrap_or("null"),
            queue = %delivery.queue,
            "{}",
            text
        );
        Ok(())
    }
}
