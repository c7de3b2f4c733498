use std::time::Duration;

use petclinic_bus::bus::{InMemoryBroker, Message, Publisher, Subscriber};
use petclinic_bus::config::BusConfig;
use petclinic_bus::pipeline::{self, PipelineError};
use petclinic_bus::topology::{
    ExchangeKind, ExchangeSpec, QueueSpec, TopologyContract, TopologyDeclarer, TopologyError,
};

use crate::support::{declared_broker, TIMEOUT};

#[test]
fn both_contracts_feed_the_same_queue() {
    let broker = InMemoryBroker::new();
    TopologyContract::pet_clinic().declare(&broker).unwrap();
    TopologyContract::pet_clinic_visits().declare(&broker).unwrap();

    assert_eq!(broker.bindings().len(), 2);

    broker
        .publish("pet-clinic", Message::with_string_payload("pet.id.1", "a"), TIMEOUT)
        .unwrap();
    broker
        .publish(
            "pet-clinic-exchange",
            Message::with_string_payload("visit-info.2", "b"),
            TIMEOUT,
        )
        .unwrap();

    assert_eq!(broker.queue_depth("visit-info"), 2);
}

#[test]
fn keys_outside_the_binding_are_not_delivered() {
    let broker = declared_broker(&TopologyContract::pet_clinic());

    broker
        .publish("pet-clinic", Message::with_string_payload("owner.id.1", "x"), TIMEOUT)
        .unwrap();
    broker
        .publish("pet-clinic", Message::with_string_payload("pet.id.1.weight", "y"), TIMEOUT)
        .unwrap();

    let delivery = broker
        .receive("visit-info", Duration::from_millis(20))
        .unwrap()
        .unwrap();
    assert_eq!(delivery.message.routing_key(), "pet.id.1.weight");
    assert!(broker
        .receive("visit-info", Duration::from_millis(20))
        .unwrap()
        .is_none());
}

#[test]
fn redeclaring_with_other_kind_conflicts() {
    let broker = declared_broker(&TopologyContract::pet_clinic());

    let err = broker
        .declare_exchange(&ExchangeSpec::topic("pet-clinic").with_kind(ExchangeKind::Fanout))
        .unwrap_err();
    assert!(matches!(err, TopologyError::TopologyConflict { .. }));
}

#[test]
fn startup_aborts_on_conflicting_queue() {
    let broker = InMemoryBroker::new();
    broker
        .declare_queue(&QueueSpec::new("visit-info").durable(true))
        .unwrap();

    let err = pipeline::start_publisher(broker.clone(), &BusConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Topology(TopologyError::TopologyConflict { .. })
    ));
    assert!(broker.bindings().is_empty());
}
