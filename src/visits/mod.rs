//! The visits service that sits in front of the publisher.
//!
//! Recording a visit stores it and then emits a best-effort notification:
//!
//! ```text
//!   record_visit(pet_id, visit)
//!        │
//!        ├── VisitStore::save          (must succeed)
//!        └── VisitPublisher::notify    (failure is logged, never surfaced)
//! ```
//!
//! With the `http` feature an axum router exposes the service.

mod error;
mod service;
mod store;
mod visit;

#[cfg(feature = "http")]
mod http;

pub use error::{VisitError, VisitStoreError};
pub use service::VisitService;
pub use store::{InMemoryVisitStore, VisitStore};
pub use visit::{Visit, MAX_DESCRIPTION_LEN};

#[cfg(feature = "http")]
pub use http::{router, serve};
