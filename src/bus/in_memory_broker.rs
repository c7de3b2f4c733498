//! In-memory topic broker for testing and single-process deployments.
//!
//! `InMemoryBroker` follows the AMQP topic model closely enough to stand in
//! for a real bus:
//! - exchanges, queues and bindings are declared idempotently
//! - a published message is copied into every queue with a matching binding
//! - deliveries stay unacknowledged until acked or nacked
//! - nacked messages are requeued (flagged as redelivered) or dead-lettered
//!
//! It can also simulate an unreachable or slow bus for failure-path tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Condvar, LockResult, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::message::{Delivery, Message};
use super::publisher::{PublishError, Publisher};
use super::subscriber::{ReceiveError, Subscriber};
use crate::topology::{Binding, ExchangeSpec, QueueSpec, TopologyDeclarer, TopologyError};

/// In-memory topic broker.
///
/// Cloning is cheap and yields another handle to the same broker, so one
/// clone can be given to a publisher and another to a consumer.
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use petclinic_bus::bus::{InMemoryBroker, Message, Publisher, Subscriber};
/// use petclinic_bus::topology::TopologyContract;
///
/// let broker = InMemoryBroker::new();
/// let contract = TopologyContract::pet_clinic();
/// contract.declare(&broker).unwrap();
///
/// let message = Message::with_string_payload(contract.routing_key(7), "hello");
/// broker.publish(&contract.exchange, message, Duration::from_secs(1)).unwrap();
///
/// let delivery = broker.receive(&contract.queue, Duration::from_millis(10)).unwrap().unwrap();
/// assert_eq!(delivery.payload_str(), Some("hello"));
/// broker.ack(delivery.tag).unwrap();
/// ```
#[derive(Clone, Default, Debug)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

#[derive(Default, Debug)]
struct Shared {
    state: Mutex<BrokerState>,
    ready: Condvar,
}

#[derive(Debug)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeSpec>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    unacked: HashMap<u64, Unacked>,
    next_tag: u64,
    available: bool,
    latency: Duration,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            exchanges: HashMap::new(),
            queues: HashMap::new(),
            bindings: Vec::new(),
            unacked: HashMap::new(),
            next_tag: 1,
            available: true,
            latency: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
struct QueueState {
    spec: QueueSpec,
    ready: VecDeque<Queued>,
}

#[derive(Debug)]
struct Queued {
    message: Message,
    redelivered: bool,
}

#[derive(Debug)]
struct Unacked {
    queue: String,
    message: Message,
}

impl BrokerState {
    /// Copy `message` into every queue bound to `exchange` with a matching pattern.
    fn route(&mut self, exchange: &str, message: &Message) -> usize {
        let targets: BTreeSet<&str> = self
            .bindings
            .iter()
            .filter(|b| b.routes(exchange, message.routing_key()))
            .map(|b| b.queue.as_str())
            .collect();

        let mut routed = 0;
        for queue in targets {
            if let Some(state) = self.queues.get_mut(queue) {
                state.ready.push_back(Queued {
                    message: message.clone(),
                    redelivered: false,
                });
                routed += 1;
            }
        }
        routed
    }

    fn dead_letter(&mut self, queue: &str, message: Message) {
        let target = self
            .queues
            .get(queue)
            .and_then(|q| q.spec.dead_letter.clone());

        match target {
            Some(target) if self.exchanges.contains_key(&target.exchange) => {
                let message = message.rerouted(target.routing_key);
                let routed = self.route(&target.exchange, &message);
                debug!(queue, exchange = %target.exchange, routed, "message dead-lettered");
            }
            Some(target) => {
                warn!(queue, exchange = %target.exchange, "dead-letter exchange not declared, message discarded");
            }
            None => debug!(queue, id = message.id(), "message discarded"),
        }
    }
}

impl InMemoryBroker {
    /// Create an empty broker with no topology declared.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> LockResult<MutexGuard<'_, BrokerState>> {
        self.shared.state.lock()
    }

    /// Lock for inspection helpers, which never fail.
    fn inspect(&self) -> MutexGuard<'_, BrokerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate the bus becoming unreachable (`false`) or reachable again.
    pub fn set_available(&self, available: bool) {
        self.inspect().available = available;
        self.shared.ready.notify_all();
    }

    /// Simulate a slow bus: every publish takes `latency` to be confirmed.
    pub fn set_latency(&self, latency: Duration) {
        self.inspect().latency = latency;
    }

    /// Number of messages waiting in `queue` (0 for unknown queues).
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.inspect()
            .queues
            .get(queue)
            .map(|q| q.ready.len())
            .unwrap_or(0)
    }

    /// Number of deliveries handed out but not yet settled.
    pub fn unacked_count(&self) -> usize {
        self.inspect().unacked.len()
    }

    /// All declared bindings.
    pub fn bindings(&self) -> Vec<Binding> {
        self.inspect().bindings.clone()
    }

    pub fn has_exchange(&self, name: &str) -> bool {
        self.inspect().exchanges.contains_key(name)
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.inspect().queues.contains_key(name)
    }
}

impl TopologyDeclarer for InMemoryBroker {
    fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), TopologyError> {
        let mut state = self
            .lock()
            .map_err(|_| TopologyError::LockPoisoned("declare exchange"))?;

        match state.exchanges.get(&spec.name).cloned() {
            Some(existing) => match existing.difference(spec) {
                Some(reason) => Err(TopologyError::conflict("exchange", &spec.name, reason)),
                None => {
                    debug!(exchange = %spec.name, "exchange already declared");
                    Ok(())
                }
            },
            None => {
                state.exchanges.insert(spec.name.clone(), spec.clone());
                info!(exchange = %spec.name, kind = %spec.kind, "exchange declared");
                Ok(())
            }
        }
    }

    fn declare_queue(&self, spec: &QueueSpec) -> Result<(), TopologyError> {
        let mut state = self
            .lock()
            .map_err(|_| TopologyError::LockPoisoned("declare queue"))?;

        match state.queues.get(&spec.name).map(|q| q.spec.clone()) {
            Some(existing) => match existing.difference(spec) {
                Some(reason) => Err(TopologyError::conflict("queue", &spec.name, reason)),
                None => {
                    debug!(queue = %spec.name, "queue already declared");
                    Ok(())
                }
            },
            None => {
                state.queues.insert(
                    spec.name.clone(),
                    QueueState {
                        spec: spec.clone(),
                        ready: VecDeque::new(),
                    },
                );
                info!(queue = %spec.name, durable = spec.durable, "queue declared");
                Ok(())
            }
        }
    }

    fn bind(&self, binding: &Binding) -> Result<(), TopologyError> {
        let mut state = self.lock().map_err(|_| TopologyError::LockPoisoned("bind"))?;

        if !state.exchanges.contains_key(&binding.exchange) {
            return Err(TopologyError::NotFound {
                entity: "exchange",
                name: binding.exchange.clone(),
            });
        }
        if !state.queues.contains_key(&binding.queue) {
            return Err(TopologyError::NotFound {
                entity: "queue",
                name: binding.queue.clone(),
            });
        }
        if state.bindings.contains(binding) {
            debug!(queue = %binding.queue, pattern = %binding.pattern, "binding already declared");
            return Ok(());
        }

        state.bindings.push(binding.clone());
        info!(
            queue = %binding.queue,
            exchange = %binding.exchange,
            pattern = %binding.pattern,
            "queue bound"
        );
        Ok(())
    }
}

impl Publisher for InMemoryBroker {
    fn publish(&self, exchange: &str, message: Message, timeout: Duration) -> Result<(), PublishError> {
        let latency = {
            let state = self.lock().map_err(|_| PublishError::LockPoisoned("publish"))?;
            if !state.available {
                return Err(PublishError::Unavailable("connection refused".into()));
            }
            state.latency
        };

        if latency >= timeout && !latency.is_zero() {
            thread::sleep(timeout);
            return Err(PublishError::Timeout(timeout));
        }
        if !latency.is_zero() {
            thread::sleep(latency);
        }

        let mut state = self.lock().map_err(|_| PublishError::LockPoisoned("publish"))?;
        if !state.exchanges.contains_key(exchange) {
            return Err(PublishError::Rejected(format!(
                "exchange '{}' is not declared",
                exchange
            )));
        }

        let routed = state.route(exchange, &message);
        if routed == 0 {
            debug!(exchange, routing_key = message.routing_key(), "message matched no binding");
        }
        drop(state);

        self.shared.ready.notify_all();
        Ok(())
    }
}

impl Subscriber for InMemoryBroker {
    fn receive(&self, queue: &str, timeout: Duration) -> Result<Option<Delivery>, ReceiveError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock().map_err(|_| ReceiveError::LockPoisoned("receive"))?;

        loop {
            if !state.available {
                return Err(ReceiveError::Unavailable("connection refused".into()));
            }

            let next = state
                .queues
                .get_mut(queue)
                .ok_or_else(|| ReceiveError::QueueNotFound(queue.to_string()))?
                .ready
                .pop_front();

            if let Some(queued) = next {
                let tag = state.next_tag;
                state.next_tag += 1;
                state.unacked.insert(
                    tag,
                    Unacked {
                        queue: queue.to_string(),
                        message: queued.message.clone(),
                    },
                );
                return Ok(Some(Delivery {
                    tag,
                    queue: queue.to_string(),
                    redelivered: queued.redelivered,
                    message: queued.message,
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            state = self
                .shared
                .ready
                .wait_timeout(state, deadline - now)
                .map_err(|_| ReceiveError::LockPoisoned("receive"))?
                .0;
        }
    }

    fn ack(&self, delivery_tag: u64) -> Result<(), ReceiveError> {
        let mut state = self.lock().map_err(|_| ReceiveError::LockPoisoned("ack"))?;
        state
            .unacked
            .remove(&delivery_tag)
            .map(|_| ())
            .ok_or(ReceiveError::UnknownDeliveryTag(delivery_tag))
    }

    fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), ReceiveError> {
        let mut state = self.lock().map_err(|_| ReceiveError::LockPoisoned("nack"))?;
        let Unacked { queue, message } = state
            .unacked
            .remove(&delivery_tag)
            .ok_or(ReceiveError::UnknownDeliveryTag(delivery_tag))?;

        if requeue {
            if let Some(q) = state.queues.get_mut(&queue) {
                q.ready.push_front(Queued {
                    message,
                    redelivered: true,
                });
            }
        } else {
            state.dead_letter(&queue, message);
        }
        drop(state);

        self.shared.ready.notify_all();
        Ok(())
    }
}
