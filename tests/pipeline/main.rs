//! Visit pipeline integration tests: topology, publishing, consuming, shutdown.

mod consume;
mod shutdown;
mod topology;
