//! Per-operation correlation values propagated into message headers.

mod context;

pub use context::{CorrelationContext, CorrelationScope, ABSENT_VALUE};

/// Context key holding the pet identifier of the operation being published.
pub const PET_ID: &str = "PET_ID";
