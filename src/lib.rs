//! Visit notification pipeline for the pet clinic services.
//!
//! - [`topology`] describes the topic exchange, queue and binding both sides agree on.
//! - [`publisher`] emits one correlated message per recorded visit.
//! - [`consumer`] drains the queue with a pool of worker threads.
//! - [`bus`] holds the transport traits and an in-memory broker.
//! - [`visits`] is the service that records visits and triggers notifications.

pub mod bus;
pub mod config;
pub mod consumer;
pub mod correlation;
pub mod pipeline;
pub mod publisher;
pub mod telemetry;
pub mod topology;
pub mod visits;

pub use bus::{Delivery, InMemoryBroker, Message, MessageBus, PublishError, Publisher, ReceiveError, Subscriber};
pub use config::{BusConfig, ConfigError};
pub use consumer::{
    Consumer, ConsumerHandle, ConsumerState, ConsumerStats, FailurePolicy, HandlerError,
    MessageHandler, VisitInfoLogger,
};
pub use correlation::{CorrelationContext, CorrelationScope, PET_ID};
pub use pipeline::{start_consumer, start_publisher, PipelineError};
pub use publisher::VisitPublisher;
pub use topology::{TopologyContract, TopologyDeclarer, TopologyError};
pub use visits::{InMemoryVisitStore, Visit, VisitService, VisitStore};
