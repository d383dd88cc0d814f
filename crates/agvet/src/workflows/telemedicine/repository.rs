use serde::{Deserialize, Serialize};

use super::domain::{
    CaseId, Notification, VeterinarianId, VeterinarianProfile, VeterinarianStatus, WorkflowState,
};
use super::onboarding::OnboardingProgress;

/// A veterinarian's aggregate: the unit of consistency for every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VeterinarianRecord {
    pub profile: VeterinarianProfile,
    pub onboarding: OnboardingProgress,
    /// Created on the first mutation that touches cases, tasks or alerts.
    pub workflow: Option<WorkflowState>,
    /// Optimistic concurrency token, bumped by the repository on every write.
    pub version: u64,
}

impl VeterinarianRecord {
    pub fn id(&self) -> &VeterinarianId {
        &self.profile.id
    }

    pub fn workflow_mut(&mut self) -> &mut WorkflowState {
        let vet_id = self.profile.id.clone();
        self.workflow
            .get_or_insert_with(|| WorkflowState::new(vet_id))
    }

    pub fn workflow_view(&self) -> WorkflowState {
        self.workflow
            .clone()
            .unwrap_or_else(|| WorkflowState::new(self.profile.id.clone()))
    }

    pub fn current_load(&self) -> u32 {
        self.workflow
            .as_ref()
            .map(WorkflowState::current_load)
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.profile.status == VeterinarianStatus::Active
    }
}

/// Persistence port for veterinarian aggregates and case ownership.
pub trait VeterinarianRepository: Send + Sync {
    /// Store a new aggregate; fails with `Conflict` when the id exists.
    fn insert(&self, record: VeterinarianRecord) -> Result<VeterinarianRecord, RepositoryError>;
    /// Replace an aggregate whose `version` still matches the stored one.
    fn update(&self, record: VeterinarianRecord) -> Result<VeterinarianRecord, RepositoryError>;
    fn fetch(&self, id: &VeterinarianId) -> Result<Option<VeterinarianRecord>, RepositoryError>;
    fn list(&self) -> Result<Vec<VeterinarianRecord>, RepositoryError>;
    fn list_active(&self) -> Result<Vec<VeterinarianRecord>, RepositoryError>;
    /// Atomically record `vet_id` as the owner of an unowned case id.
    fn claim_case(&self, case_id: &CaseId, vet_id: &VeterinarianId)
        -> Result<(), RepositoryError>;
    /// Undo a claim made by `vet_id`; used when the aggregate write fails.
    fn release_case(
        &self,
        case_id: &CaseId,
        vet_id: &VeterinarianId,
    ) -> Result<(), RepositoryError>;
    fn case_owner(&self, case_id: &CaseId) -> Result<Option<VeterinarianId>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write (expected version {expected}, stored version {found})")]
    StaleVersion { expected: u64, found: u64 },
    #[error("case {case_id} is already owned by {owner}")]
    CaseClaimed {
        case_id: CaseId,
        owner: VeterinarianId,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound delivery hook (push, e-mail, SMS). Fire-and-forget from the caller's view.
pub trait NotificationSender: Send + Sync {
    fn send(
        &self,
        vet_id: &VeterinarianId,
        notification: &Notification,
    ) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Identity/verification provider for license and education checks. May be slow.
pub trait VerificationPort: Send + Sync {
    fn verify_license(&self, number: &str, state: &str) -> Result<bool, VerificationError>;
    fn verify_education(&self, institution: &str, degree: &str)
        -> Result<bool, VerificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("verification provider unavailable: {0}")]
    Unavailable(String),
    #[error("verification timed out after {0} seconds")]
    TimedOut(u64),
}
