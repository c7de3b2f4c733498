//! Routing topology: exchanges, queues and the bindings between them.
//!
//! ```text
//!   publisher ──(routing key "pet.id.7")──► [exchange: pet-clinic, topic]
//!                                                   │ binding "pet.id.#"
//!                                                   ▼
//!                                           [queue: visit-info] ──► consumer
//! ```
//!
//! Declarations go through [`TopologyDeclarer`] and are idempotent, so every
//! service declares the topology it relies on at each start.

mod binding;
mod contract;
mod declarer;
mod error;
mod exchange;
mod pattern;
mod queue;

pub use binding::Binding;
pub use contract::{
    TopologyContract, PET_CLINIC_EXCHANGE, PET_CLINIC_VISITS_EXCHANGE, PET_ID_ROUTING_PREFIX,
    TRACE_ID_HEADER, VISIT_INFO_QUEUE, VISIT_INFO_ROUTING_PREFIX,
};
pub use declarer::TopologyDeclarer;
pub use error::TopologyError;
pub use exchange::{ExchangeKind, ExchangeSpec};
pub use pattern::topic_matches;
pub use queue::{DeadLetterTarget, QueueSpec};
