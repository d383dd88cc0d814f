use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{CaseId, VeterinarianId};
use super::repository::{RepositoryError, VeterinarianRecord, VeterinarianRepository};

/// Process-local repository with versioned writes and case-ownership claims.
#[derive(Debug, Default, Clone)]
pub struct InMemoryVeterinarianRepository {
    records: Arc<Mutex<HashMap<VeterinarianId, VeterinarianRecord>>>,
    case_owners: Arc<Mutex<HashMap<CaseId, VeterinarianId>>>,
}

fn acquire<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
}

impl VeterinarianRepository for InMemoryVeterinarianRepository {
    fn insert(&self, mut record: VeterinarianRecord) -> Result<VeterinarianRecord, RepositoryError> {
        let mut guard = acquire(&self.records)?;
        match guard.entry(record.id().clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict),
            Entry::Vacant(slot) => {
                record.version = 1;
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    fn update(&self, mut record: VeterinarianRecord) -> Result<VeterinarianRecord, RepositoryError> {
        let mut guard = acquire(&self.records)?;
        let stored = guard
            .get_mut(record.id())
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != record.version {
            return Err(RepositoryError::StaleVersion {
                expected: record.version,
                found: stored.version,
            });
        }

        record.version += 1;
        *stored = record.clone();
        Ok(record)
    }

    fn fetch(&self, id: &VeterinarianId) -> Result<Option<VeterinarianRecord>, RepositoryError> {
        let guard = acquire(&self.records)?;
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<VeterinarianRecord>, RepositoryError> {
        let guard = acquire(&self.records)?;
        let mut records: Vec<VeterinarianRecord> = guard.values().cloned().collect();
        records.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(records)
    }

    fn list_active(&self) -> Result<Vec<VeterinarianRecord>, RepositoryError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(VeterinarianRecord::is_active)
            .collect())
    }

    fn claim_case(&self, case_id: &CaseId, vet_id: &VeterinarianId) -> Result<(), RepositoryError> {
        let mut guard = acquire(&self.case_owners)?;
        match guard.entry(case_id.clone()) {
            Entry::Occupied(owner) => Err(RepositoryError::CaseClaimed {
                case_id: case_id.clone(),
                owner: owner.get().clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(vet_id.clone());
                Ok(())
            }
        }
    }

    fn release_case(
        &self,
        case_id: &CaseId,
        vet_id: &VeterinarianId,
    ) -> Result<(), RepositoryError> {
        let mut guard = acquire(&self.case_owners)?;
        if guard.get(case_id) == Some(vet_id) {
            guard.remove(case_id);
        }
        Ok(())
    }

    fn case_owner(&self, case_id: &CaseId) -> Result<Option<VeterinarianId>, RepositoryError> {
        let guard = acquire(&self.case_owners)?;
        Ok(guard.get(case_id).cloned())
    }
}
