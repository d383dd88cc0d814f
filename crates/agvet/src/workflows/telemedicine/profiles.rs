use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::domain::{
    Availability, NewVeterinarian, PerformanceMetrics, Preferences, Specialization,
    VeterinarianId, VeterinarianProfile, VeterinarianStatus,
};
use super::locks::AggregateLocks;
use super::onboarding::OnboardingProgress;
use super::repository::{RepositoryError, VeterinarianRecord, VeterinarianRepository};
use super::service::ServiceError;
use super::validation;

/// Registration, lookup and profile edits over the veterinarian repository.
pub struct ProfileStore<R> {
    repository: Arc<R>,
    locks: Arc<AggregateLocks>,
}

impl<R> ProfileStore<R>
where
    R: VeterinarianRepository + 'static,
{
    pub fn new(repository: Arc<R>, locks: Arc<AggregateLocks>) -> Self {
        Self { repository, locks }
    }

    /// Register a veterinarian as `pending_verification` with onboarding started.
    pub fn register(&self, submission: NewVeterinarian) -> Result<VeterinarianProfile, ServiceError> {
        validation::validate_registration(&submission)?;

        let now = Utc::now();
        let profile = VeterinarianProfile {
            id: submission.id,
            name: submission.name.trim().to_string(),
            email: submission.email.trim().to_string(),
            license: submission.license,
            education: submission.education,
            specializations: submission.specializations,
            availability: submission.availability,
            preferences: submission.preferences,
            performance: PerformanceMetrics::with_commitment(
                submission.response_time_commitment_minutes,
            ),
            status: VeterinarianStatus::PendingVerification,
            created_at: now,
            updated_at: now,
        };
        let record = VeterinarianRecord {
            onboarding: OnboardingProgress::start(profile.id.clone(), now),
            profile,
            workflow: None,
            version: 0,
        };

        let vet_id = record.id().clone();
        let stored = self.repository.insert(record).map_err(|err| match err {
            RepositoryError::Conflict => ServiceError::AlreadyRegistered(vet_id),
            other => ServiceError::Repository(other),
        })?;

        info!(vet_id = %stored.id(), "veterinarian registered");
        Ok(stored.profile)
    }

    pub fn record(&self, vet_id: &VeterinarianId) -> Result<VeterinarianRecord, ServiceError> {
        self.repository
            .fetch(vet_id)?
            .ok_or_else(|| ServiceError::not_found("veterinarian", vet_id))
    }

    pub fn get(&self, vet_id: &VeterinarianId) -> Result<VeterinarianProfile, ServiceError> {
        Ok(self.record(vet_id)?.profile)
    }

    pub fn list(&self) -> Result<Vec<VeterinarianProfile>, ServiceError> {
        Ok(self
            .repository
            .list()?
            .into_iter()
            .map(|record| record.profile)
            .collect())
    }

    pub fn list_active(&self) -> Result<Vec<VeterinarianProfile>, ServiceError> {
        Ok(self
            .repository
            .list_active()?
            .into_iter()
            .map(|record| record.profile)
            .collect())
    }

    /// Active veterinarians listing `topic` among their specializations.
    pub fn find_by_specialty(&self, topic: &str) -> Result<Vec<VeterinarianProfile>, ServiceError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(validation::ValidationError::MissingField("specialty").into());
        }
        Ok(self
            .list_active()?
            .into_iter()
            .filter(|profile| profile.has_specialty(topic))
            .collect())
    }

    /// Active veterinarians with a free slot at `at` and spare daily capacity.
    pub fn find_available(&self, at: DateTime<Utc>) -> Result<Vec<VeterinarianProfile>, ServiceError> {
        Ok(self
            .repository
            .list_active()?
            .into_iter()
            .filter(|record| {
                record.profile.availability.has_slot_at(at)
                    && record.current_load() < record.profile.availability.max_cases_per_day
            })
            .map(|record| record.profile)
            .collect())
    }

    pub fn update_availability(
        &self,
        vet_id: &VeterinarianId,
        availability: Availability,
    ) -> Result<VeterinarianProfile, ServiceError> {
        validation::validate_availability(&availability)?;
        let (_, record) = self.mutate(vet_id, |record| {
            record.profile.availability = availability;
            Ok(())
        })?;
        Ok(record.profile)
    }

    pub fn update_preferences(
        &self,
        vet_id: &VeterinarianId,
        preferences: Preferences,
    ) -> Result<VeterinarianProfile, ServiceError> {
        let (_, record) = self.mutate(vet_id, |record| {
            record.profile.preferences = preferences;
            Ok(())
        })?;
        Ok(record.profile)
    }

    pub fn update_specializations(
        &self,
        vet_id: &VeterinarianId,
        specializations: Vec<Specialization>,
    ) -> Result<VeterinarianProfile, ServiceError> {
        validation::validate_specializations(&specializations)?;
        let (_, record) = self.mutate(vet_id, |record| {
            record.profile.specializations = specializations;
            Ok(())
        })?;
        Ok(record.profile)
    }

    /// Change the lifecycle status. Deactivation is terminal.
    pub fn set_status(
        &self,
        vet_id: &VeterinarianId,
        status: VeterinarianStatus,
    ) -> Result<VeterinarianProfile, ServiceError> {
        let (previous, record) = self.mutate(vet_id, |record| {
            let previous = record.profile.status;
            if previous == VeterinarianStatus::Deactivated && status != previous {
                return Err(ServiceError::InvalidTransition(format!(
                    "veterinarian {} is deactivated and cannot become {}",
                    record.id(),
                    status
                )));
            }
            record.profile.status = status;
            Ok(previous)
        })?;

        if previous != status {
            info!(vet_id = %vet_id, from = %previous, to = %status, "veterinarian status changed");
        }
        Ok(record.profile)
    }

    pub fn deactivate(&self, vet_id: &VeterinarianId) -> Result<VeterinarianProfile, ServiceError> {
        self.set_status(vet_id, VeterinarianStatus::Deactivated)
    }

    /// Serialized read-modify-write of one aggregate.
    ///
    /// The closure works on a copy; nothing is stored when it returns an error. The profile's
    /// `updated_at` is refreshed on every successful write.
    pub(crate) fn mutate<T>(
        &self,
        vet_id: &VeterinarianId,
        change: impl FnOnce(&mut VeterinarianRecord) -> Result<T, ServiceError>,
    ) -> Result<(T, VeterinarianRecord), ServiceError> {
        let handle = self.locks.handle(vet_id);
        let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.record(vet_id)?;
        let value = change(&mut record)?;
        record.profile.updated_at = Utc::now();
        let stored = self.repository.update(record)?;
        debug!(vet_id = %vet_id, version = stored.version, "aggregate updated");
        Ok((value, stored))
    }
}
