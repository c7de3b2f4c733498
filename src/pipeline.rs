//! Startup wiring: declare topology, then build the publisher and consumer.
//!
//! Topology is declared before either side is handed out, and a declaration
//! conflict aborts startup.

use thiserror::Error;
use tracing::error;

use crate::bus::MessageBus;
use crate::config::BusConfig;
use crate::consumer::{Consumer, ConsumerError, ConsumerHandle, MessageHandler};
use crate::publisher::VisitPublisher;
use crate::topology::TopologyError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("topology declaration failed: {0}")]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Consumer(#[from] ConsumerError),
}

/// Declare the configured topology and return a publisher for it.
pub fn start_publisher<B>(bus: B, config: &BusConfig) -> Result<VisitPublisher<B>, PipelineError>
where
    B: MessageBus,
{
    declare(&bus, config)?;
    Ok(VisitPublisher::new(bus, config.topology.clone()).with_timeout(config.publish_timeout()))
}

/// Declare the configured topology and start consuming its queue with `handler`.
pub fn start_consumer<B, H>(
    bus: B,
    config: &BusConfig,
    handler: H,
) -> Result<ConsumerHandle<B>, PipelineError>
where
    B: MessageBus + 'static,
    H: MessageHandler + 'static,
{
    declare(&bus, config)?;
    let consumer = Consumer::new(bus, config.topology.queue.clone(), handler)
        .with_options(config.consumer_options());
    Ok(consumer.start()?)
}

fn declare<B: MessageBus>(bus: &B, config: &BusConfig) -> Result<(), TopologyError> {
    config.topology.declare(bus).map_err(|err| {
        error!(error = %err, exchange = %config.topology.exchange, "topology declaration failed");
        err
    })
}
