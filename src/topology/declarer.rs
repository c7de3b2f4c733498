use super::binding::Binding;
use super::error::TopologyError;
use super::exchange::ExchangeSpec;
use super::queue::QueueSpec;

/// Applies topology declarations to a bus.
///
/// Every method must be idempotent: repeating a declaration with identical
/// parameters succeeds without changing anything, so services can declare
/// their topology on every start without assuming a fresh bus.
pub trait TopologyDeclarer: Send + Sync {
    /// Declare an exchange. Fails with `TopologyConflict` if the name exists with other properties.
    fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), TopologyError>;

    /// Declare a queue. Fails with `TopologyConflict` if the name exists with other properties.
    fn declare_queue(&self, spec: &QueueSpec) -> Result<(), TopologyError>;

    /// Bind a declared queue to a declared exchange.
    fn bind(&self, binding: &Binding) -> Result<(), TopologyError>;
}
