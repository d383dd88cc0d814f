//! Agricultural-veterinary telemedicine core.
//!
//! Veterinarian profiles, the onboarding state machine, case matching, the per-veterinarian
//! case/task workflow and performance monitoring. All state for one veterinarian lives in a
//! single [`VeterinarianRecord`] aggregate that every mutation reads, changes and writes back
//! under that veterinarian's lock.

pub mod domain;
pub mod lifecycle;
mod locks;
pub mod matching;
pub mod memory;
pub mod onboarding;
pub mod performance;
pub mod profiles;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    ActiveCase, AlertId, AlertKind, AlertSeverity, Availability, BlackoutPeriod, CaseId,
    CaseRequest, CaseRequirements, CaseStatus, ConsultationType, DailySchedule, EducationInfo,
    EmergencyAvailability, ExperienceLevel, LicenseInfo, NewTask, NewVeterinarian, Notification,
    NotificationId, NotificationKind, PerformanceAlert, PerformanceMetrics, Preferences,
    Priority, Specialization, StudentLevel, TaskId, TaskKind, TaskStatus, TimeSlot,
    UrgencyLevel, VeterinarianId, VeterinarianProfile, VeterinarianStatus, WeeklySchedule,
    WorkflowState, WorkflowTask,
};
pub use lifecycle::{TaskCompletion, WorkflowConfig};
pub use matching::{MatchFactor, MatchResult, MatchingConfig, ScoreComponent};
pub use memory::InMemoryVeterinarianRepository;
pub use onboarding::{
    OnboardingProgress, OnboardingStep, StepOutcome, StepProgress, StepReport, StepStatus,
};
pub use performance::PerformanceThresholds;
pub use profiles::ProfileStore;
pub use repository::{
    NotificationError, NotificationSender, RepositoryError, VerificationError, VerificationPort,
    VeterinarianRecord, VeterinarianRepository,
};
pub use router::telemedicine_router;
pub use service::{CaseUpdate, EngineConfig, RatingUpdate, ServiceError, TelemedicineService};
pub use validation::ValidationError;
