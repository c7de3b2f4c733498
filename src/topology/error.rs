use thiserror::Error;

/// Error type for topology declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// A name is already declared with different properties.
    #[error("topology conflict for {entity} '{name}': {reason}")]
    TopologyConflict {
        entity: &'static str,
        name: String,
        reason: String,
    },
    /// A binding refers to an exchange or queue that was never declared.
    #[error("{entity} '{name}' is not declared")]
    NotFound { entity: &'static str, name: String },
    /// The contract between publisher and topology cannot route its own keys.
    #[error("invalid topology contract: {0}")]
    InvalidContract(String),
    /// The broker's internal state lock was poisoned.
    #[error("broker lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl TopologyError {
    pub(crate) fn conflict(
        entity: &'static str,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TopologyError::TopologyConflict {
            entity,
            name: name.into(),
            reason: reason.into(),
        }
    }
}
