use std::time::Instant;

use tracing::info;

use super::error::VisitError;
use super::store::VisitStore;
use super::visit::{Visit, MAX_DESCRIPTION_LEN};
use crate::bus::Publisher;
use crate::publisher::VisitPublisher;
use crate::telemetry;

/// Records visits and announces them on the bus.
pub struct VisitService<S, P> {
    store: S,
    publisher: VisitPublisher<P>,
}

impl<S: VisitStore, P: Publisher> VisitService<S, P> {
    pub fn new(store: S, publisher: VisitPublisher<P>) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn publisher(&self) -> &VisitPublisher<P> {
        &self.publisher
    }

    /// Save a visit for `pet_id`, then notify subscribers.
    ///
    /// Any `id` on the incoming visit is ignored; the store assigns one.
    /// The notification is best-effort: once the visit is saved this returns
    /// `Ok` even if the publish fails.
    pub fn record_visit(&self, pet_id: u32, mut visit: Visit) -> Result<Visit, VisitError> {
        timed("record_visit", || {
            check_pet_id(pet_id)?;
            let len = visit.description.chars().count();
            if len > MAX_DESCRIPTION_LEN {
                return Err(VisitError::DescriptionTooLong(len));
            }

            visit.id = None;
            visit.pet_id = pet_id;
            info!(pet_id, date = %visit.date, "saving visit");
            let saved = self.store.save(visit)?;

            self.publisher.notify_visit_recorded(pet_id, saved.date);
            Ok(saved)
        })
    }

    pub fn visits(&self, pet_id: u32) -> Result<Vec<Visit>, VisitError> {
        timed("visits", || {
            check_pet_id(pet_id)?;
            Ok(self.store.find_by_pet_id(pet_id)?)
        })
    }

    /// Visits for each distinct pet in `pet_ids`, in first-seen order.
    pub fn visits_for(&self, pet_ids: &[u32]) -> Result<Vec<Visit>, VisitError> {
        timed("visits_for", || {
            let mut distinct = Vec::with_capacity(pet_ids.len());
            for &pet_id in pet_ids {
                check_pet_id(pet_id)?;
                if !distinct.contains(&pet_id) {
                    distinct.push(pet_id);
                }
            }
            Ok(self.store.find_by_pet_ids(&distinct)?)
        })
    }
}

fn check_pet_id(pet_id: u32) -> Result<(), VisitError> {
    if pet_id < 1 {
        return Err(VisitError::InvalidPetId(pet_id));
    }
    Ok(())
}

/// Run a service call under the `petclinic.visit` timer.
fn timed<T>(method: &'static str, call: impl FnOnce() -> Result<T, VisitError>) -> Result<T, VisitError> {
    let started = Instant::now();
    let result = call();
    let outcome = if result.is_ok() { "success" } else { "error" };
    metrics::histogram!(telemetry::VISIT_TIMER, "method" => method, "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
    result
}
