//! Tracing subscriber setup and the metrics this crate records.
//!
//! Metrics go through the `metrics` facade; nothing is recorded until the
//! application installs a recorder (for example a Prometheus exporter).

use metrics::{describe_counter, describe_histogram, Unit};
use tracing_subscriber::EnvFilter;

/// Time spent in a visits service call. Labels: `method`, `outcome`.
pub const VISIT_TIMER: &str = "petclinic.visit";
/// Visit notifications handed to the bus. Labels: `exchange`, `outcome`.
pub const PUBLISHED: &str = "petclinic.bus.published";
/// Deliveries settled by a consumer. Labels: `queue`, `outcome`.
pub const DELIVERIES: &str = "petclinic.bus.deliveries";
/// Time spent in a message handler. Label: `queue`.
pub const HANDLER_TIMER: &str = "petclinic.bus.handler";

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Fails if a global subscriber is already installed.
pub fn try_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .try_init()
}

/// Like [`try_init`], ignoring an already-installed subscriber.
pub fn init() {
    let _ = try_init();
}

/// Register descriptions for every metric with the installed recorder.
pub fn describe_metrics() {
    describe_histogram!(VISIT_TIMER, Unit::Seconds, "Time spent in visits service calls");
    describe_counter!(PUBLISHED, "Visit notifications handed to the bus, by outcome");
    describe_counter!(DELIVERIES, "Deliveries settled by consumers, by outcome");
    describe_histogram!(HANDLER_TIMER, Unit::Seconds, "Time spent in message handlers");
}
