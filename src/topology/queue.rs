/// Where a queue sends messages that are rejected without requeue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeadLetterTarget {
    pub exchange: String,
    pub routing_key: String,
}

impl DeadLetterTarget {
    pub fn new(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        }
    }
}

/// Declaration parameters for a queue.
///
/// Queues are non-durable unless stated otherwise: their contents are lost if
/// the bus restarts while nobody is consuming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    pub dead_letter: Option<DeadLetterTarget>,
}

impl QueueSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            dead_letter: None,
        }
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn with_dead_letter(mut self, target: DeadLetterTarget) -> Self {
        self.dead_letter = Some(target);
        self
    }

    pub(crate) fn difference(&self, other: &QueueSpec) -> Option<String> {
        if self.durable != other.durable {
            return Some(format!(
                "declared with durable={}, requested durable={}",
                self.durable, other.durable
            ));
        }
        if self.dead_letter != other.dead_letter {
            return Some("dead-letter target differs".to_string());
        }
        None
    }
}
