//! Consuming side of the visit pipeline.
//!
//! A [`Consumer`] subscribes to one queue and hands every delivery to a
//! [`MessageHandler`] on a pool of worker threads. The handler's typed
//! result, together with the [`FailurePolicy`], decides whether the delivery
//! is acknowledged, requeued or rejected. Handler failures never stop the
//! receive loop.

mod consumer;
mod handler;
mod policy;
mod state;

pub use consumer::{
    Consumer, ConsumerError, ConsumerHandle, ConsumerOptions, ConsumerStats,
    DEFAULT_POLL_INTERVAL, DEFAULT_SHUTDOWN_TIMEOUT, MIN_POLL_INTERVAL,
};
pub use handler::{HandlerError, HandlerResult, MessageHandler, VisitInfoLogger};
pub use policy::{FailurePolicy, Settlement};
pub use state::ConsumerState;
