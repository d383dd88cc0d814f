use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::domain::VeterinarianId;

/// Per-veterinarian mutexes serializing read-modify-write cycles on one aggregate.
///
/// Operations on different veterinarians never contend; the registry lock is only held long
/// enough to look up or create a handle.
#[derive(Debug, Default)]
pub struct AggregateLocks {
    handles: Mutex<HashMap<VeterinarianId, Arc<Mutex<()>>>>,
}

impl AggregateLocks {
    pub fn handle(&self, vet_id: &VeterinarianId) -> Arc<Mutex<()>> {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.entry(vet_id.clone()).or_default().clone()
    }
}
