//! Publishing side of the visit pipeline.

mod visit_publisher;

pub use visit_publisher::{visit_recorded_text, VisitPublisher, DEFAULT_PUBLISH_TIMEOUT};
