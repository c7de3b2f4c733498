//! Pooled consumer for one queue.
//!
//! `Consumer` spawns `concurrency` worker threads. Each worker runs its own
//! receive loop against the queue and invokes the handler for every
//! delivery it takes, so a slow handler only ever occupies its own worker.
//! Deliveries are settled (ack/nack) from the handler's typed result and the
//! configured [`FailurePolicy`].

use std::collections::HashSet;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::handler::{HandlerError, HandlerResult, MessageHandler};
use super::policy::{FailurePolicy, Settlement};
use super::state::ConsumerState;
use crate::bus::{Delivery, Subscriber};
use crate::telemetry;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Shortest wait a worker makes per receive call.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Tuning knobs for a [`Consumer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOptions {
    /// Number of worker threads, i.e. concurrent deliveries.
    pub concurrency: usize,
    /// How long each receive call waits for a message before re-checking for shutdown.
    pub poll_interval: Duration,
    /// Grace period for in-flight handlers when stopping.
    pub shutdown_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ConsumerOptions {
    /// The receive wait workers actually use: at least [`MIN_POLL_INTERVAL`]
    /// and at most half the shutdown timeout, so a stopping worker notices
    /// the stop well before shutdown gives up on it.
    pub fn effective_poll_interval(&self) -> Duration {
        let ceiling = (self.shutdown_timeout / 2).max(MIN_POLL_INTERVAL);
        self.poll_interval.clamp(MIN_POLL_INTERVAL, ceiling)
    }
}

/// Statistics from a running or stopped consumer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Deliveries whose handler succeeded.
    pub handled: usize,
    /// Deliveries whose handler failed (including panics).
    pub failed: usize,
    /// Failed deliveries returned to the queue.
    pub requeued: usize,
    /// Failed deliveries rejected without requeue (dead-lettered or discarded by the bus).
    pub rejected: usize,
    /// Failed deliveries acknowledged and dropped.
    pub dropped: usize,
    /// In-flight deliveries given back to the bus when shutdown timed out.
    pub abandoned: usize,
    /// Deliveries received after shutdown began and returned unhandled.
    pub returned: usize,
    /// Number of receive calls made.
    pub polls: usize,
}

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("failed to spawn consumer worker: {0}")]
    Spawn(#[from] std::io::Error),
}

struct Lifecycle {
    state: ConsumerState,
    in_flight: HashSet<u64>,
    running: usize,
    stats: ConsumerStats,
}

struct Shared {
    queue: String,
    lifecycle: Mutex<Lifecycle>,
    changed: Condvar,
}

impl Shared {
    fn new(queue: String) -> Self {
        Self {
            queue,
            lifecycle: Mutex::new(Lifecycle {
                state: ConsumerState::Starting,
                in_flight: HashSet::new(),
                running: 0,
                stats: ConsumerStats::default(),
            }),
            changed: Condvar::new(),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stopping(&self) -> bool {
        matches!(
            self.lifecycle().state,
            ConsumerState::Stopping | ConsumerState::Stopped
        )
    }

    /// Register a delivery as in flight. Refused once shutdown has begun.
    fn begin(&self, tag: u64) -> bool {
        let mut lifecycle = self.lifecycle();
        match lifecycle.state {
            ConsumerState::Starting | ConsumerState::Listening => {
                lifecycle.in_flight.insert(tag);
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if the caller still owns settlement of `tag`.
    fn finish(&self, tag: u64) -> bool {
        let owned = self.lifecycle().in_flight.remove(&tag);
        self.changed.notify_all();
        owned
    }

    fn record(&self, update: impl FnOnce(&mut ConsumerStats)) {
        update(&mut self.lifecycle().stats);
    }

    fn worker_exited(&self) {
        let mut lifecycle = self.lifecycle();
        lifecycle.running = lifecycle.running.saturating_sub(1);
        if lifecycle.running == 0 && lifecycle.state == ConsumerState::Stopping {
            lifecycle.state = ConsumerState::Stopped;
        }
        drop(lifecycle);
        self.changed.notify_all();
    }
}

/// A consumer for one queue, configured but not yet started.
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use petclinic_bus::bus::InMemoryBroker;
/// use petclinic_bus::consumer::{Consumer, FailurePolicy, VisitInfoLogger};
/// use petclinic_bus::topology::TopologyContract;
///
/// let broker = InMemoryBroker::new();
/// TopologyContract::pet_clinic().declare(&broker).unwrap();
///
/// let handle = Consumer::new(broker.clone(), "visit-info", VisitInfoLogger)
///     .concurrency(4)
///     .failure_policy(FailurePolicy::RequeueOnce)
///     .poll_interval(Duration::from_millis(10))
///     .start()
///     .unwrap();
///
/// let stats = handle.stop();
/// assert_eq!(stats.handled, 0);
/// ```
pub struct Consumer<S, H> {
    subscriber: Arc<S>,
    handler: Arc<H>,
    queue: String,
    options: ConsumerOptions,
}

impl<S, H> Consumer<S, H>
where
    S: Subscriber + 'static,
    H: MessageHandler + 'static,
{
    pub fn new(subscriber: S, queue: impl Into<String>, handler: H) -> Self {
        Self {
            subscriber: Arc::new(subscriber),
            handler: Arc::new(handler),
            queue: queue.into(),
            options: ConsumerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConsumerOptions) -> Self {
        self.options = options;
        self.options.concurrency = self.options.concurrency.max(1);
        self
    }

    pub fn concurrency(mut self, workers: usize) -> Self {
        self.options.concurrency = workers.max(1);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.options.shutdown_timeout = timeout;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.options.failure_policy = policy;
        self
    }

    /// Spawn the worker threads and start listening.
    pub fn start(mut self) -> Result<ConsumerHandle<S>, ConsumerError> {
        let poll_interval = self.options.effective_poll_interval();
        if poll_interval != self.options.poll_interval {
            warn!(
                queue = %self.queue,
                requested = ?self.options.poll_interval,
                effective = ?poll_interval,
                "poll interval adjusted"
            );
            self.options.poll_interval = poll_interval;
        }

        let shared = Arc::new(Shared::new(self.queue.clone()));
        info!(
            queue = %self.queue,
            concurrency = self.options.concurrency,
            policy = %self.options.failure_policy,
            "consumer starting"
        );

        let mut handle = ConsumerHandle {
            shared: Arc::clone(&shared),
            subscriber: Arc::clone(&self.subscriber),
            workers: Vec::with_capacity(self.options.concurrency),
            shutdown_timeout: self.options.shutdown_timeout,
        };

        for worker in 0..self.options.concurrency {
            let subscriber = Arc::clone(&self.subscriber);
            let handler = Arc::clone(&self.handler);
            let worker_shared = Arc::clone(&shared);
            let options = self.options.clone();

            shared.lifecycle().running += 1;
            let spawned = thread::Builder::new()
                .name(format!("{}-consumer-{}", self.queue, worker))
                .spawn(move || run_worker(worker, &*subscriber, &*handler, &worker_shared, &options));

            match spawned {
                Ok(join) => handle.workers.push(join),
                Err(err) => {
                    shared.worker_exited();
                    error!(queue = %self.queue, error = %err, "failed to spawn consumer worker");
                    handle.shutdown();
                    return Err(err.into());
                }
            }
        }

        {
            let mut lifecycle = shared.lifecycle();
            if lifecycle.state == ConsumerState::Starting {
                lifecycle.state = ConsumerState::Listening;
            }
        }
        info!(queue = %self.queue, "consumer listening");
        Ok(handle)
    }
}

/// Handle to a running consumer. Call `stop()` to shut down gracefully;
/// dropping the handle signals stop without waiting.
pub struct ConsumerHandle<S: Subscriber> {
    shared: Arc<Shared>,
    subscriber: Arc<S>,
    workers: Vec<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl<S: Subscriber> ConsumerHandle<S> {
    pub fn queue(&self) -> &str {
        &self.shared.queue
    }

    /// Current lifecycle state; `Handling` while any handler is running.
    pub fn state(&self) -> ConsumerState {
        let lifecycle = self.shared.lifecycle();
        match lifecycle.state {
            ConsumerState::Listening if !lifecycle.in_flight.is_empty() => ConsumerState::Handling,
            state => state,
        }
    }

    /// Snapshot of the statistics so far.
    pub fn stats(&self) -> ConsumerStats {
        self.shared.lifecycle().stats.clone()
    }

    /// Stop taking new deliveries without waiting for in-flight handlers.
    pub fn signal_stop(&self) {
        let mut lifecycle = self.shared.lifecycle();
        if matches!(
            lifecycle.state,
            ConsumerState::Starting | ConsumerState::Listening
        ) {
            lifecycle.state = ConsumerState::Stopping;
            info!(queue = %self.shared.queue, in_flight = lifecycle.in_flight.len(), "consumer stopping");
        }
        drop(lifecycle);
        self.shared.changed.notify_all();
    }

    /// Stop the consumer, waiting up to the shutdown timeout for in-flight
    /// handlers to finish. Returns the final statistics.
    ///
    /// Deliveries still in flight when the timeout expires are left
    /// unacknowledged and handed back to the bus for redelivery.
    pub fn stop(mut self) -> ConsumerStats {
        self.shutdown()
    }

    fn shutdown(&mut self) -> ConsumerStats {
        self.signal_stop();

        let lifecycle = self.shared.lifecycle();
        let (mut lifecycle, _) = self
            .shared
            .changed
            .wait_timeout_while(lifecycle, self.shutdown_timeout, |l| l.running > 0)
            .unwrap_or_else(PoisonError::into_inner);

        let drained = lifecycle.running == 0;
        let abandoned: Vec<u64> = if drained {
            Vec::new()
        } else {
            lifecycle.in_flight.drain().collect()
        };
        lifecycle.stats.abandoned += abandoned.len();
        lifecycle.state = ConsumerState::Stopped;
        let stats = lifecycle.stats.clone();
        drop(lifecycle);

        for tag in &abandoned {
            if let Err(err) = self.subscriber.nack(*tag, true) {
                warn!(queue = %self.shared.queue, tag, error = %err, "failed to return abandoned delivery");
            }
        }
        if !abandoned.is_empty() {
            count_delivery(&self.shared.queue, "abandoned", abandoned.len() as u64);
            warn!(
                queue = %self.shared.queue,
                abandoned = abandoned.len(),
                "shutdown timed out, in-flight deliveries left for redelivery"
            );
        }

        let workers = mem::take(&mut self.workers);
        if drained {
            for worker in workers {
                if worker.join().is_err() {
                    warn!(queue = %self.shared.queue, "consumer worker panicked");
                }
            }
        }

        info!(
            queue = %self.shared.queue,
            handled = stats.handled,
            failed = stats.failed,
            "consumer stopped"
        );
        stats
    }
}

impl<S: Subscriber> Drop for ConsumerHandle<S> {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

fn run_worker<S, H>(worker: usize, subscriber: &S, handler: &H, shared: &Shared, options: &ConsumerOptions)
where
    S: Subscriber,
    H: MessageHandler,
{
    debug!(queue = %shared.queue, worker, "consumer worker started");

    while !shared.is_stopping() {
        let received = subscriber.receive(&shared.queue, options.poll_interval);
        shared.record(|stats| stats.polls += 1);

        let delivery = match received {
            Ok(Some(delivery)) => delivery,
            Ok(None) => continue,
            Err(err) => {
                warn!(queue = %shared.queue, worker, error = %err, "receive failed");
                thread::sleep(options.poll_interval);
                continue;
            }
        };

        if !shared.begin(delivery.tag) {
            // Shutdown began while this delivery was on its way.
            if let Err(err) = subscriber.nack(delivery.tag, true) {
                warn!(queue = %shared.queue, tag = delivery.tag, error = %err, "failed to return delivery");
            }
            shared.record(|stats| stats.returned += 1);
            count_delivery(&shared.queue, "returned", 1);
            break;
        }

        let started = Instant::now();
        let outcome = invoke(handler, &delivery);
        metrics::histogram!(telemetry::HANDLER_TIMER, "queue" => shared.queue.clone())
            .record(started.elapsed().as_secs_f64());
        if shared.finish(delivery.tag) {
            settle(subscriber, &delivery, outcome, options.failure_policy, shared);
        } else {
            debug!(queue = %shared.queue, tag = delivery.tag, "delivery abandoned at shutdown");
        }
    }

    shared.worker_exited();
    debug!(queue = %shared.queue, worker, "consumer worker exited");
}

/// Run the handler, turning a panic into a fatal error.
fn invoke<H: MessageHandler>(handler: &H, delivery: &Delivery) -> HandlerResult {
    panic::catch_unwind(AssertUnwindSafe(|| handler.handle(delivery))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(HandlerError::Fatal(format!("handler panicked: {}", reason)))
    })
}

fn settle<S: Subscriber>(
    subscriber: &S,
    delivery: &Delivery,
    outcome: HandlerResult,
    policy: FailurePolicy,
    shared: &Shared,
) {
    let trace_id = delivery.trace_id().unwrap_or("null");
    let settlement = match &outcome {
        Ok(()) => {
            debug!(queue = %shared.queue, tag = delivery.tag, trace_id, "delivery handled");
            Settlement::Ack
        }
        Err(err) => {
            let settlement = policy.settlement(err, delivery.redelivered);
            match err {
                HandlerError::Retryable(_) => warn!(
                    queue = %shared.queue,
                    tag = delivery.tag,
                    trace_id,
                    error = %err,
                    ?settlement,
                    "handler failed"
                ),
                HandlerError::Fatal(_) => error!(
                    queue = %shared.queue,
                    tag = delivery.tag,
                    trace_id,
                    error = %err,
                    ?settlement,
                    "handler failed"
                ),
            }
            settlement
        }
    };

    let result = match settlement {
        Settlement::Ack => subscriber.ack(delivery.tag),
        Settlement::Requeue => subscriber.nack(delivery.tag, true),
        Settlement::Reject => subscriber.nack(delivery.tag, false),
    };
    if let Err(err) = result {
        warn!(queue = %shared.queue, tag = delivery.tag, error = %err, "failed to settle delivery");
    }

    let label = match (outcome.is_ok(), settlement) {
        (true, _) => "handled",
        (false, Settlement::Ack) => "dropped",
        (false, Settlement::Requeue) => "requeued",
        (false, Settlement::Reject) => "rejected",
    };
    count_delivery(&shared.queue, label, 1);

    shared.record(|stats| match (outcome.is_ok(), settlement) {
        (true, _) => stats.handled += 1,
        (false, Settlement::Ack) => {
            stats.failed += 1;
            stats.dropped += 1;
        }
        (false, Settlement::Requeue) => {
            stats.failed += 1;
            stats.requeued += 1;
        }
        (false, Settlement::Reject) => {
            stats.failed += 1;
            stats.rejected += 1;
        }
    });
}

fn count_delivery(queue: &str, outcome: &'static str, n: u64) {
    metrics::counter!(
        telemetry::DELIVERIES,
        "queue" => queue.to_string(),
        "outcome" => outcome
    )
    .increment(n);
}
