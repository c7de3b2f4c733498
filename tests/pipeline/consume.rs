use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use petclinic_bus::bus::{Delivery, InMemoryBroker, Subscriber};
use petclinic_bus::config::BusConfig;
use petclinic_bus::consumer::{Consumer, FailurePolicy, HandlerError, HandlerResult};
use petclinic_bus::pipeline;
use petclinic_bus::publisher::VisitPublisher;
use petclinic_bus::topology::{
    Binding, DeadLetterTarget, ExchangeSpec, QueueSpec, TopologyContract, TopologyDeclarer,
};

use crate::support::{declared_broker, wait_until, Recorder, POLL, TIMEOUT};

fn may_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

fn end_to_end(contract: TopologyContract, expected_key: &str) {
    let config = BusConfig {
        topology: contract,
        ..BusConfig::default()
    };
    let broker = InMemoryBroker::new();
    let recorder = Recorder::new();

    let handle = pipeline::start_consumer(broker.clone(), &config, recorder.clone()).unwrap();
    let publisher = pipeline::start_publisher(broker.clone(), &config).unwrap();

    publisher.publish_visit_recorded(7, may_first()).unwrap();
    assert!(wait_until(TIMEOUT, || recorder.count() == 1));

    let stats = handle.stop();
    let delivery = &recorder.deliveries()[0];
    assert_eq!(
        delivery.payload_str(),
        Some("Recorded a visit on 2024-05-01 for pet with ID 7")
    );
    assert_eq!(delivery.trace_id(), Some(expected_key));
    assert_eq!(delivery.message.routing_key(), expected_key);
    assert_eq!(stats.handled, 1);
    assert_eq!(broker.unacked_count(), 0);
}

#[test]
fn end_to_end_pet_clinic_contract() {
    end_to_end(TopologyContract::pet_clinic(), "pet.id.7");
}

#[test]
fn end_to_end_visits_exchange_contract() {
    end_to_end(TopologyContract::pet_clinic_visits(), "visit-info.7");
}

#[test]
fn failing_handler_does_not_stop_later_deliveries() {
    let contract = TopologyContract::pet_clinic();
    let broker = declared_broker(&contract);
    let publisher = VisitPublisher::new(broker.clone(), contract);
    let handled = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&handled);
    let handle = Consumer::new(broker.clone(), "visit-info", move |delivery: &Delivery| -> HandlerResult {
        if delivery.message.routing_key() == "pet.id.1" {
            return Err(HandlerError::Retryable("owner lookup failed".into()));
        }
        seen.lock().unwrap().push(delivery.message.routing_key().to_string());
        Ok(())
    })
    .poll_interval(POLL)
    .start()
    .unwrap();

    for pet_id in 1..=3 {
        publisher.publish_visit_recorded(pet_id, may_first()).unwrap();
    }
    assert!(wait_until(TIMEOUT, || handle.stats().handled == 2 && handle.stats().failed == 1));

    let stats = handle.stop();
    assert_eq!(stats.dropped, 1);
    assert_eq!(*handled.lock().unwrap(), vec!["pet.id.2", "pet.id.3"]);
    assert_eq!(broker.queue_depth("visit-info"), 0);
    assert_eq!(broker.unacked_count(), 0);
}

#[test]
fn each_message_is_handled_once_across_workers() {
    let contract = TopologyContract::pet_clinic();
    let broker = declared_broker(&contract);
    let publisher = VisitPublisher::new(broker.clone(), contract);
    let recorder = Recorder::new();

    let handle = Consumer::new(broker.clone(), "visit-info", recorder.clone())
        .concurrency(4)
        .poll_interval(POLL)
        .start()
        .unwrap();

    for pet_id in 1..=50 {
        publisher.publish_visit_recorded(pet_id, may_first()).unwrap();
    }
    assert!(wait_until(TIMEOUT, || recorder.count() >= 50));
    let stats = handle.stop();

    let ids: HashSet<String> = recorder
        .deliveries()
        .iter()
        .map(|d| d.message.id().to_string())
        .collect();
    assert_eq!(recorder.count(), 50);
    assert_eq!(ids.len(), 50);
    assert_eq!(stats.handled, 50);
}

#[test]
fn requeue_once_retries_then_gives_up() {
    let contract = TopologyContract::pet_clinic();
    let broker = declared_broker(&contract);
    let publisher = VisitPublisher::new(broker.clone(), contract);
    let redelivered = Arc::new(Mutex::new(Vec::new()));

    let flags = Arc::clone(&redelivered);
    let handle = Consumer::new(broker.clone(), "visit-info", move |delivery: &Delivery| -> HandlerResult {
        flags.lock().unwrap().push(delivery.redelivered);
        Err(HandlerError::Retryable("customers service down".into()))
    })
    .failure_policy(FailurePolicy::RequeueOnce)
    .poll_interval(POLL)
    .start()
    .unwrap();

    publisher.publish_visit_recorded(4, may_first()).unwrap();
    assert!(wait_until(TIMEOUT, || handle.stats().rejected == 1));

    let stats = handle.stop();
    assert_eq!(*redelivered.lock().unwrap(), vec![false, true]);
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(broker.queue_depth("visit-info"), 0);
}

#[test]
fn fatal_errors_are_not_requeued() {
    let contract = TopologyContract::pet_clinic();
    let broker = declared_broker(&contract);
    let publisher = VisitPublisher::new(broker.clone(), contract);
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let handle = Consumer::new(broker.clone(), "visit-info", move |_: &Delivery| -> HandlerResult {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(HandlerError::Fatal("malformed".into()))
    })
    .failure_policy(FailurePolicy::RequeueOnce)
    .poll_interval(POLL)
    .start()
    .unwrap();

    publisher.publish_visit_recorded(4, may_first()).unwrap();
    assert!(wait_until(TIMEOUT, || handle.stats().rejected == 1));
    std::thread::sleep(Duration::from_millis(50));

    let stats = handle.stop();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(stats.requeued, 0);
}

#[test]
fn dead_letter_policy_routes_failures_aside() {
    let contract = TopologyContract::pet_clinic();
    let broker = InMemoryBroker::new();
    broker.declare_exchange(&contract.exchange_spec()).unwrap();
    broker.declare_exchange(&ExchangeSpec::topic("pet-clinic-dlx")).unwrap();
    broker
        .declare_queue(
            &QueueSpec::new("visit-info")
                .with_dead_letter(DeadLetterTarget::new("pet-clinic-dlx", "visit-info.dead")),
        )
        .unwrap();
    broker.declare_queue(&QueueSpec::new("visit-info.dead")).unwrap();
    broker.bind(&contract.binding()).unwrap();
    broker
        .bind(&Binding::new("visit-info.dead", "pet-clinic-dlx", "visit-info.dead"))
        .unwrap();

    let publisher = VisitPublisher::new(broker.clone(), contract);
    let handle = Consumer::new(broker.clone(), "visit-info", |_: &Delivery| -> HandlerResult {
        Err(HandlerError::Retryable("no owner".into()))
    })
    .failure_policy(FailurePolicy::DeadLetter)
    .poll_interval(POLL)
    .start()
    .unwrap();

    publisher.publish_visit_recorded(9, may_first()).unwrap();
    assert!(wait_until(TIMEOUT, || broker.queue_depth("visit-info.dead") == 1));
    let stats = handle.stop();
    assert_eq!(stats.rejected, 1);

    let dead = broker
        .receive("visit-info.dead", Duration::from_millis(20))
        .unwrap()
        .unwrap();
    assert_eq!(dead.trace_id(), Some("pet.id.9"));
    assert_eq!(
        dead.payload_str(),
        Some("Recorded a visit on 2024-05-01 for pet with ID 9")
    );
}

#[test]
fn panicking_handler_is_contained() {
    let contract = TopologyContract::pet_clinic();
    let broker = declared_broker(&contract);
    let publisher = VisitPublisher::new(broker.clone(), contract);

    let handle = Consumer::new(broker.clone(), "visit-info", |delivery: &Delivery| -> HandlerResult {
        if delivery.message.routing_key() == "pet.id.1" {
            panic!("boom");
        }
        Ok(())
    })
    .poll_interval(POLL)
    .start()
    .unwrap();

    publisher.publish_visit_recorded(1, may_first()).unwrap();
    publisher.publish_visit_recorded(2, may_first()).unwrap();
    assert!(wait_until(TIMEOUT, || handle.stats().handled == 1));

    let stats = handle.stop();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.dropped, 1);
    assert_eq!(broker.unacked_count(), 0);
}

#[test]
fn consumer_survives_a_bus_outage() {
    let contract = TopologyContract::pet_clinic();
    let broker = declared_broker(&contract);
    let publisher = VisitPublisher::new(broker.clone(), contract);
    let recorder = Recorder::new();

    broker.set_available(false);
    let handle = Consumer::new(broker.clone(), "visit-info", recorder.clone())
        .poll_interval(POLL)
        .start()
        .unwrap();
    assert!(wait_until(TIMEOUT, || handle.stats().polls >= 3));
    assert_eq!(handle.state(), petclinic_bus::consumer::ConsumerState::Listening);

    broker.set_available(true);
    publisher.publish_visit_recorded(11, may_first()).unwrap();
    assert!(wait_until(TIMEOUT, || recorder.count() == 1));

    let stats = handle.stop();
    assert_eq!(stats.handled, 1);
    assert_eq!(recorder.deliveries()[0].trace_id(), Some("pet.id.11"));
    assert_eq!(broker.unacked_count(), 0);
}
