//! Message bus abstractions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                MessageBus (blanket trait)                    │
//! │  TopologyDeclarer + Publisher + Subscriber                  │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                    │
//!          ▼                   ▼                    ▼
//! ┌────────────────┐  ┌─────────────────┐  ┌─────────────────────┐
//! │TopologyDeclarer│  │ Publisher       │  │ Subscriber          │
//! │ exchange/queue │  │ publish(exch,   │  │ receive(queue) /    │
//! │ bind           │  │   msg, timeout) │  │ ack(tag) / nack(tag)│
//! └────────────────┘  └─────────────────┘  └─────────────────────┘
//!                              │
//!                              ▼
//!                     ┌────────────────┐
//!                     │ InMemoryBroker │
//!                     │  (included)    │
//!                     └────────────────┘
//! ```
//!
//! A networked AMQP client plugs in by implementing the same three traits.

mod event_bus;
mod in_memory_broker;
mod message;
mod publisher;
mod subscriber;

pub use event_bus::MessageBus;
pub use in_memory_broker::InMemoryBroker;
pub use message::{Delivery, Message};
pub use publisher::{PublishError, Publisher};
pub use subscriber::{ReceiveError, Subscriber};
