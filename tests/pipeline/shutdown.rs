use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use petclinic_bus::consumer::{Consumer, ConsumerState};
use petclinic_bus::publisher::VisitPublisher;
use petclinic_bus::topology::TopologyContract;

use crate::support::{declared_broker, wait_until, Gate, Recorder, POLL, TIMEOUT};

fn may_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

#[test]
fn stop_waits_for_handler_in_progress() {
    let contract = TopologyContract::pet_clinic();
    let broker = declared_broker(&contract);
    let publisher = VisitPublisher::new(broker.clone(), contract);
    let gate = Gate::new();

    let handle = Consumer::new(broker.clone(), "visit-info", gate.clone())
        .poll_interval(POLL)
        .shutdown_timeout(TIMEOUT)
        .start()
        .unwrap();

    publisher.publish_visit_recorded(1, may_first()).unwrap();
    assert!(wait_until(TIMEOUT, || gate.entered() == 1));
    assert_eq!(handle.state(), ConsumerState::Handling);

    let stopped = Arc::new(AtomicBool::new(false));
    let done = Arc::clone(&stopped);
    let stopper = thread::spawn(move || {
        let stats = handle.stop();
        done.store(true, Ordering::SeqCst);
        stats
    });

    thread::sleep(Duration::from_millis(100));
    assert!(!stopped.load(Ordering::SeqCst));

    gate.open();
    let stats = stopper.join().unwrap();
    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(stats.handled, 1);
    assert_eq!(stats.abandoned, 0);
    assert_eq!(broker.unacked_count(), 0);
}

#[test]
fn messages_published_during_shutdown_stay_queued() {
    let contract = TopologyContract::pet_clinic();
    let broker = declared_broker(&contract);
    let publisher = VisitPublisher::new(broker.clone(), contract);
    let gate = Gate::new();

    let handle = Consumer::new(broker.clone(), "visit-info", gate.clone())
        .poll_interval(POLL)
        .shutdown_timeout(TIMEOUT)
        .start()
        .unwrap();

    publisher.publish_visit_recorded(1, may_first()).unwrap();
    assert!(wait_until(TIMEOUT, || gate.entered() == 1));

    handle.signal_stop();
    assert_eq!(handle.state(), ConsumerState::Stopping);
    publisher.publish_visit_recorded(2, may_first()).unwrap();

    gate.open();
    let stats = handle.stop();

    assert_eq!(stats.handled, 1);
    assert_eq!(gate.entered(), 1);
    assert_eq!(broker.queue_depth("visit-info"), 1);
    assert_eq!(broker.unacked_count(), 0);
}

#[test]
fn stopped_consumer_takes_nothing_new() {
    let contract = TopologyContract::pet_clinic();
    let broker = declared_broker(&contract);
    let publisher = VisitPublisher::new(broker.clone(), contract);
    let recorder = Recorder::new();

    let handle = Consumer::new(broker.clone(), "visit-info", recorder.clone())
        .concurrency(2)
        .poll_interval(POLL)
        .start()
        .unwrap();
    let stats = handle.stop();
    assert_eq!(stats.handled, 0);

    publisher.publish_visit_recorded(5, may_first()).unwrap();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(recorder.count(), 0);
    assert_eq!(broker.queue_depth("visit-info"), 1);
}

#[test]
fn shutdown_timeout_hands_work_back_for_redelivery() {
    let contract = TopologyContract::pet_clinic();
    let broker = declared_broker(&contract);
    let publisher = VisitPublisher::new(broker.clone(), contract);
    let gate = Gate::new();

    let handle = Consumer::new(broker.clone(), "visit-info", gate.clone())
        .poll_interval(POLL)
        .shutdown_timeout(Duration::from_millis(100))
        .start()
        .unwrap();

    publisher.publish_visit_recorded(6, may_first()).unwrap();
    assert!(wait_until(TIMEOUT, || gate.entered() == 1));

    let stats = handle.stop();
    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.handled, 0);
    assert_eq!(broker.queue_depth("visit-info"), 1);
    assert_eq!(broker.unacked_count(), 0);

    // The stuck handler finishing late must not settle the returned delivery.
    gate.open();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(broker.queue_depth("visit-info"), 1);

    let recorder = Recorder::new();
    let second = Consumer::new(broker.clone(), "visit-info", recorder.clone())
        .poll_interval(POLL)
        .start()
        .unwrap();
    assert!(wait_until(TIMEOUT, || recorder.count() == 1));
    second.stop();

    let redelivered = &recorder.deliveries()[0];
    assert!(redelivered.redelivered);
    assert_eq!(redelivered.trace_id(), Some("pet.id.6"));
}

#[test]
fn zero_poll_interval_does_not_spin() {
    let broker = declared_broker(&TopologyContract::pet_clinic());

    let handle = Consumer::new(broker.clone(), "visit-info", Recorder::new())
        .poll_interval(Duration::ZERO)
        .start()
        .unwrap();
    thread::sleep(Duration::from_millis(200));
    let stats = handle.stop();

    assert!(stats.polls <= 400, "{} polls while idle", stats.polls);
}

#[test]
fn long_poll_interval_does_not_outlast_shutdown() {
    let broker = declared_broker(&TopologyContract::pet_clinic());

    let handle = Consumer::new(broker.clone(), "visit-info", Recorder::new())
        .poll_interval(Duration::from_secs(3600))
        .shutdown_timeout(Duration::from_millis(400))
        .start()
        .unwrap();
    thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    let stats = handle.stop();

    assert!(started.elapsed() < Duration::from_millis(350));
    assert_eq!(stats.abandoned, 0);
    assert!(stats.polls >= 1);
}
