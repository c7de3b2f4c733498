use std::fmt;

use serde::{Deserialize, Serialize};

/// Routing behaviour of an exchange.
///
/// Only topic exchanges are used by the visit pipeline; `Direct` and `Fanout`
/// exist so that a conflicting re-declaration can be described and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Topic,
    Direct,
    Fanout,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeKind::Topic => write!(f, "topic"),
            ExchangeKind::Direct => write!(f, "direct"),
            ExchangeKind::Fanout => write!(f, "fanout"),
        }
    }
}

/// Declaration parameters for an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
}

impl ExchangeSpec {
    /// A durable topic exchange, the AMQP client default.
    pub fn topic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ExchangeKind::Topic,
            durable: true,
        }
    }

    pub fn with_kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Describes how `other` differs from `self`, if it does.
    pub(crate) fn difference(&self, other: &ExchangeSpec) -> Option<String> {
        if self.kind != other.kind {
            return Some(format!("declared as {}, requested {}", self.kind, other.kind));
        }
        if self.durable != other.durable {
            return Some(format!(
                "declared with durable={}, requested durable={}",
                self.durable, other.durable
            ));
        }
        None
    }
}
