//! The wire contract shared by the visits publisher and its subscribers.
//!
//! Publisher and topology owner must agree on the exchange name, the queue
//! name and the routing-key prefix. Keeping the three together in one value,
//! and validating that the binding pattern routes the publisher's keys, turns
//! drift between services into a startup error.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::binding::Binding;
use super::declarer::TopologyDeclarer;
use super::error::TopologyError;
use super::exchange::ExchangeSpec;
use super::pattern::topic_matches;
use super::queue::QueueSpec;

/// Exchange declared by the customers service.
pub const PET_CLINIC_EXCHANGE: &str = "pet-clinic";
/// Exchange declared by the visits service.
pub const PET_CLINIC_VISITS_EXCHANGE: &str = "pet-clinic-exchange";
/// The one well-known queue carrying visit notifications.
pub const VISIT_INFO_QUEUE: &str = "visit-info";
/// Routing-key prefix paired with [`PET_CLINIC_EXCHANGE`].
pub const PET_ID_ROUTING_PREFIX: &str = "pet.id.";
/// Routing-key prefix paired with [`PET_CLINIC_VISITS_EXCHANGE`].
pub const VISIT_INFO_ROUTING_PREFIX: &str = "visit-info.";
/// Message header carrying the correlation trace.
pub const TRACE_ID_HEADER: &str = "traceId";

/// Exchange, queue and routing-key prefix agreed between services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyContract {
    pub exchange: String,
    pub queue: String,
    pub routing_prefix: String,
}

impl TopologyContract {
    pub fn new(
        exchange: impl Into<String>,
        queue: impl Into<String>,
        routing_prefix: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            queue: queue.into(),
            routing_prefix: routing_prefix.into(),
        }
    }

    /// `pet-clinic` / `visit-info` / `pet.id.`
    pub fn pet_clinic() -> Self {
        Self::new(PET_CLINIC_EXCHANGE, VISIT_INFO_QUEUE, PET_ID_ROUTING_PREFIX)
    }

    /// `pet-clinic-exchange` / `visit-info` / `visit-info.`
    pub fn pet_clinic_visits() -> Self {
        Self::new(
            PET_CLINIC_VISITS_EXCHANGE,
            VISIT_INFO_QUEUE,
            VISIT_INFO_ROUTING_PREFIX,
        )
    }

    /// The pattern the queue is bound with: the prefix followed by `#`.
    pub fn binding_pattern(&self) -> String {
        format!("{}#", self.routing_prefix)
    }

    /// Routing key for one entity: the prefix followed by its identifier.
    pub fn routing_key(&self, entity_id: impl Display) -> String {
        format!("{}{}", self.routing_prefix, entity_id)
    }

    pub fn exchange_spec(&self) -> ExchangeSpec {
        ExchangeSpec::topic(&self.exchange)
    }

    pub fn queue_spec(&self) -> QueueSpec {
        QueueSpec::new(&self.queue)
    }

    pub fn binding(&self) -> Binding {
        Binding::new(&self.queue, &self.exchange, self.binding_pattern())
    }

    /// Check that names are present and that the binding routes this contract's keys.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.exchange.trim().is_empty() {
            return Err(TopologyError::InvalidContract("exchange name is empty".into()));
        }
        if self.queue.trim().is_empty() {
            return Err(TopologyError::InvalidContract("queue name is empty".into()));
        }
        if self.routing_prefix.contains(['*', '#']) {
            return Err(TopologyError::InvalidContract(format!(
                "routing prefix '{}' contains a wildcard",
                self.routing_prefix
            )));
        }
        let sample_key = self.routing_key(1);
        if !topic_matches(&self.binding_pattern(), &sample_key) {
            return Err(TopologyError::InvalidContract(format!(
                "binding '{}' does not route key '{}'",
                self.binding_pattern(),
                sample_key
            )));
        }
        Ok(())
    }

    /// Validate the contract, then declare exchange, queue and binding.
    pub fn declare<D: TopologyDeclarer + ?Sized>(&self, declarer: &D) -> Result<(), TopologyError> {
        self.validate()?;
        declarer.declare_exchange(&self.exchange_spec())?;
        declarer.declare_queue(&self.queue_spec())?;
        declarer.bind(&self.binding())?;
        info!(
            exchange = %self.exchange,
            queue = %self.queue,
            pattern = %self.binding_pattern(),
            "topology declared"
        );
        Ok(())
    }
}

impl Default for TopologyContract {
    fn default() -> Self {
        Self::pet_clinic()
    }
}
