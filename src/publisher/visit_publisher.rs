//! Publishes "visit recorded" facts to the clinic's topic exchange.

use std::fmt::Display;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::bus::{Message, PublishError, Publisher};
use crate::correlation::{CorrelationContext, PET_ID};
use crate::telemetry;
use crate::topology::{TopologyContract, TRACE_ID_HEADER};

/// Upper bound on how long one publish may block the calling request.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Human-readable body of a visit notification.
pub fn visit_recorded_text(visit_date: impl Display, pet_id: impl Display) -> String {
    format!("Recorded a visit on {} for pet with ID {}", visit_date, pet_id)
}

/// Sends one notification per recorded visit.
///
/// Each message is routed with `routing_prefix + pet_id` and carries a
/// `traceId` header with the same value, so consumers and log aggregators
/// can tie it back to the pet it is about.
///
/// ## Example
///
/// ```
/// use chrono::NaiveDate;
/// use petclinic_bus::bus::{InMemoryBroker, Subscriber};
/// use petclinic_bus::publisher::VisitPublisher;
/// use petclinic_bus::topology::TopologyContract;
/// use std::time::Duration;
///
/// let broker = InMemoryBroker::new();
/// let contract = TopologyContract::pet_clinic();
/// contract.declare(&broker).unwrap();
///
/// let publisher = VisitPublisher::new(broker.clone(), contract);
/// let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
/// publisher.publish_visit_recorded(7, date).unwrap();
///
/// let delivery = broker.receive("visit-info", Duration::from_millis(10)).unwrap().unwrap();
/// assert_eq!(delivery.trace_id(), Some("pet.id.7"));
/// ```
#[derive(Debug)]
pub struct VisitPublisher<P> {
    publisher: P,
    contract: TopologyContract,
    timeout: Duration,
}

impl<P: Publisher> VisitPublisher<P> {
    pub fn new(publisher: P, contract: TopologyContract) -> Self {
        Self {
            publisher,
            contract,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn contract(&self) -> &TopologyContract {
        &self.contract
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Publish that a visit was recorded for `pet_id` on `visit_date`.
    ///
    /// Uses a correlation context private to this call.
    pub fn publish_visit_recorded(&self, pet_id: u32, visit_date: NaiveDate) -> Result<(), PublishError> {
        let mut context = CorrelationContext::new();
        self.publish_visit_recorded_in(&mut context, pet_id, visit_date)
    }

    /// Publish within the caller's per-operation correlation context.
    ///
    /// `PET_ID` is set in `context` for the duration of the call and is
    /// removed before returning, whether or not the publish succeeded.
    pub fn publish_visit_recorded_in(
        &self,
        context: &mut CorrelationContext,
        pet_id: u32,
        visit_date: NaiveDate,
    ) -> Result<(), PublishError> {
        let routing_key = self.contract.routing_key(pet_id);
        let scope = context.scope(PET_ID, pet_id.to_string());

        let trace_id = self.contract.routing_key(scope.value());
        let message = Message::with_string_payload(&routing_key, visit_recorded_text(visit_date, pet_id))
            .with_header(TRACE_ID_HEADER, trace_id);

        debug!(
            exchange = %self.contract.exchange,
            routing_key = %routing_key,
            id = message.id(),
            "publishing visit notification"
        );
        let result = self.publisher.publish(&self.contract.exchange, message, self.timeout);
        let outcome = match &result {
            Ok(()) => "ok",
            Err(err) => err.kind(),
        };
        metrics::counter!(
            telemetry::PUBLISHED,
            "exchange" => self.contract.exchange.clone(),
            "outcome" => outcome
        )
        .increment(1);
        result
    }

    /// Publish, downgrading transport failures to a logged warning.
    ///
    /// Returns whether the notification went out. Callers that have already
    /// committed their primary effect use this so a bus outage never fails
    /// their request.
    pub fn notify_visit_recorded(&self, pet_id: u32, visit_date: NaiveDate) -> bool {
        match self.publish_visit_recorded(pet_id, visit_date) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    pet_id,
                    exchange = %self.contract.exchange,
                    error = %err,
                    "visit notification not published"
                );
                false
            }
        }
    }
}
