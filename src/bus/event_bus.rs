//! Combined trait for a bus that can declare topology, publish and deliver.

use super::publisher::Publisher;
use super::subscriber::Subscriber;
use crate::topology::TopologyDeclarer;

/// A full message bus: topology declaration plus both directions of traffic.
pub trait MessageBus: TopologyDeclarer + Publisher + Subscriber {}

// Blanket implementation
impl<T: TopologyDeclarer + Publisher + Subscriber> MessageBus for T {}
