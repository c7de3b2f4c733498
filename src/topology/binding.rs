use super::pattern::topic_matches;

/// Routes messages from an exchange into a queue when the routing key
/// matches `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
    pub queue: String,
    pub exchange: String,
    pub pattern: String,
}

impl Binding {
    pub fn new(
        queue: impl Into<String>,
        exchange: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            queue: queue.into(),
            exchange: exchange.into(),
            pattern: pattern.into(),
        }
    }

    /// Whether a message published to `exchange` with `routing_key` reaches this binding's queue.
    pub fn routes(&self, exchange: &str, routing_key: &str) -> bool {
        self.exchange == exchange && topic_matches(&self.pattern, routing_key)
    }
}
