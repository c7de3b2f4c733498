use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::error::VisitStoreError;
use super::visit::Visit;

/// Persistence for visits.
pub trait VisitStore: Send + Sync {
    /// Store a visit, assigning an id if it has none. Returns the stored visit.
    fn save(&self, visit: Visit) -> Result<Visit, VisitStoreError>;

    fn find_by_pet_id(&self, pet_id: u32) -> Result<Vec<Visit>, VisitStoreError>;

    /// Visits for any of the given pets, grouped in the order the ids are given.
    fn find_by_pet_ids(&self, pet_ids: &[u32]) -> Result<Vec<Visit>, VisitStoreError> {
        let mut visits = Vec::new();
        for pet_id in pet_ids {
            visits.extend(self.find_by_pet_id(*pet_id)?);
        }
        Ok(visits)
    }
}

/// Visits kept in memory, indexed by pet.
#[derive(Clone)]
pub struct InMemoryVisitStore {
    by_pet: Arc<RwLock<HashMap<u32, Vec<Visit>>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryVisitStore {
    pub fn new() -> Self {
        Self {
            by_pet: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for InMemoryVisitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VisitStore for InMemoryVisitStore {
    fn save(&self, mut visit: Visit) -> Result<Visit, VisitStoreError> {
        let mut by_pet = self
            .by_pet
            .write()
            .map_err(|_| VisitStoreError::LockPoisoned("write"))?;

        match visit.id {
            Some(id) => {
                // Later generated ids must not collide with this one.
                self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);

                let existing = by_pet.iter().find_map(|(pet_id, visits)| {
                    visits
                        .iter()
                        .position(|v| v.id == Some(id))
                        .map(|pos| (*pet_id, pos))
                });
                match existing {
                    Some((pet_id, pos)) if pet_id == visit.pet_id => {
                        if let Some(slot) = by_pet.get_mut(&pet_id).and_then(|v| v.get_mut(pos)) {
                            *slot = visit.clone();
                        }
                        return Ok(visit);
                    }
                    Some((pet_id, pos)) => {
                        if let Some(visits) = by_pet.get_mut(&pet_id) {
                            visits.remove(pos);
                        }
                    }
                    None => {}
                }
            }
            None => visit.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst)),
        }

        by_pet.entry(visit.pet_id).or_default().push(visit.clone());
        Ok(visit)
    }

    fn find_by_pet_id(&self, pet_id: u32) -> Result<Vec<Visit>, VisitStoreError> {
        let by_pet = self
            .by_pet
            .read()
            .map_err(|_| VisitStoreError::LockPoisoned("read"))?;
        Ok(by_pet.get(&pet_id).cloned().unwrap_or_default())
    }
}
