use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::telemedicine::domain::{
    Availability, CaseId, CaseRequest, CaseRequirements, ConsultationType, EducationInfo,
    EmergencyAvailability, ExperienceLevel, LicenseInfo, NewVeterinarian, Notification,
    PerformanceMetrics, Preferences, Specialization, StudentLevel, TimeSlot, UrgencyLevel,
    VeterinarianId, VeterinarianProfile, VeterinarianStatus, WeeklySchedule,
};
use crate::workflows::telemedicine::memory::InMemoryVeterinarianRepository;
use crate::workflows::telemedicine::repository::{
    NotificationError, NotificationSender, RepositoryError, VerificationError, VerificationPort,
    VeterinarianRecord, VeterinarianRepository,
};
use crate::workflows::telemedicine::{EngineConfig, TelemedicineService};

/// 2025-06-02 is a Monday.
pub(super) fn monday_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub(super) fn business_hours() -> Availability {
    Availability {
        weekly_schedule: WeeklySchedule::weekdays(vec![TimeSlot {
            start: time(8, 0),
            end: time(17, 0),
        }]),
        blackout_periods: Vec::new(),
        emergency: EmergencyAvailability {
            available: true,
            response_time_minutes: 30,
        },
        max_cases_per_day: 4,
    }
}

pub(super) fn preferences() -> Preferences {
    Preferences {
        student_levels: BTreeSet::from([StudentLevel::Undergraduate]),
        educational_focus: BTreeSet::from(["herd_health".to_string()]),
        consultation_types: BTreeSet::from([ConsultationType::Video]),
    }
}

pub(super) fn specialization(topic: &str) -> Specialization {
    Specialization {
        topic: topic.to_string(),
        experience_level: ExperienceLevel::Advanced,
        years_experience: 8,
    }
}

pub(super) fn new_vet(id: &str, topic: &str) -> NewVeterinarian {
    NewVeterinarian {
        id: VeterinarianId::new(id),
        name: format!("Dr. {id}"),
        email: format!("{id}@clinic.example"),
        license: LicenseInfo {
            number: format!("LIC-{id}"),
            state: "IA".to_string(),
        },
        education: EducationInfo {
            institution: "Iowa State University".to_string(),
            degree: "DVM".to_string(),
            graduation_year: Some(2012),
        },
        specializations: vec![specialization(topic)],
        availability: business_hours(),
        preferences: preferences(),
        response_time_commitment_minutes: 60.0,
    }
}

/// Active profile snapshot for engine-level tests.
pub(super) fn active_profile(id: &str, topic: &str, rating: f64) -> VeterinarianProfile {
    let submission = new_vet(id, topic);
    let mut performance = PerformanceMetrics::with_commitment(60.0);
    performance.client_satisfaction.overall_rating = rating;
    performance.client_satisfaction.total_ratings = u32::from(rating > 0.0);

    VeterinarianProfile {
        id: submission.id,
        name: submission.name,
        email: submission.email,
        license: submission.license,
        education: submission.education,
        specializations: submission.specializations,
        availability: submission.availability,
        preferences: submission.preferences,
        performance,
        status: VeterinarianStatus::Active,
        created_at: monday_at(8, 0),
        updated_at: monday_at(8, 0),
    }
}

pub(super) fn requirements(topic: &str) -> CaseRequirements {
    CaseRequirements {
        specialty: topic.to_string(),
        urgency: UrgencyLevel::Routine,
        student_level: StudentLevel::Undergraduate,
        educational_objectives: vec!["herd_health".to_string()],
        consultation_type: ConsultationType::Video,
        scheduled_time: monday_at(10, 0),
    }
}

pub(super) fn case_request(id: &str, topic: &str) -> CaseRequest {
    CaseRequest {
        case_id: CaseId::new(id),
        summary: "Respiratory symptoms in a feedlot pen".to_string(),
        requirements: requirements(topic),
    }
}

pub(super) type MemoryService = TelemedicineService<InMemoryVeterinarianRepository, MemoryNotifier>;

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryVeterinarianRepository>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(InMemoryVeterinarianRepository::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service =
        TelemedicineService::new(repository.clone(), notifier.clone(), EngineConfig::default());
    (service, repository, notifier)
}

/// Register and activate a veterinarian without walking onboarding.
pub(super) fn register_active<R, N>(
    service: &TelemedicineService<R, N>,
    id: &str,
    topic: &str,
) -> VeterinarianId
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let profile = service
        .profiles()
        .register(new_vet(id, topic))
        .expect("registration succeeds");
    service
        .profiles()
        .set_status(&profile.id, VeterinarianStatus::Active)
        .expect("activation succeeds");
    profile.id
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<(VeterinarianId, Notification)>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<(VeterinarianId, Notification)> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationSender for MemoryNotifier {
    fn send(
        &self,
        vet_id: &VeterinarianId,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push((vet_id.clone(), notification.clone()));
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl NotificationSender for FailingNotifier {
    fn send(
        &self,
        _vet_id: &VeterinarianId,
        _notification: &Notification,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("push gateway offline".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl VeterinarianRepository for UnavailableRepository {
    fn insert(&self, _record: VeterinarianRecord) -> Result<VeterinarianRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: VeterinarianRecord) -> Result<VeterinarianRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &VeterinarianId) -> Result<Option<VeterinarianRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<VeterinarianRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_active(&self) -> Result<Vec<VeterinarianRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn claim_case(&self, _case_id: &CaseId, _vet_id: &VeterinarianId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn release_case(
        &self,
        _case_id: &CaseId,
        _vet_id: &VeterinarianId,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn case_owner(&self, _case_id: &CaseId) -> Result<Option<VeterinarianId>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// In-memory repository whose aggregate writes can be switched off.
#[derive(Default)]
pub(super) struct FlakyRepository {
    pub(super) inner: InMemoryVeterinarianRepository,
    pub(super) reject_updates: AtomicBool,
}

impl FlakyRepository {
    pub(super) fn fail_updates(&self) {
        self.reject_updates.store(true, Ordering::SeqCst);
    }
}

impl VeterinarianRepository for FlakyRepository {
    fn insert(&self, record: VeterinarianRecord) -> Result<VeterinarianRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, record: VeterinarianRecord) -> Result<VeterinarianRecord, RepositoryError> {
        if self.reject_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("write quorum lost".to_string()));
        }
        self.inner.update(record)
    }

    fn fetch(&self, id: &VeterinarianId) -> Result<Option<VeterinarianRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self) -> Result<Vec<VeterinarianRecord>, RepositoryError> {
        self.inner.list()
    }

    fn list_active(&self) -> Result<Vec<VeterinarianRecord>, RepositoryError> {
        self.inner.list_active()
    }

    fn claim_case(&self, case_id: &CaseId, vet_id: &VeterinarianId) -> Result<(), RepositoryError> {
        self.inner.claim_case(case_id, vet_id)
    }

    fn release_case(
        &self,
        case_id: &CaseId,
        vet_id: &VeterinarianId,
    ) -> Result<(), RepositoryError> {
        self.inner.release_case(case_id, vet_id)
    }

    fn case_owner(&self, case_id: &CaseId) -> Result<Option<VeterinarianId>, RepositoryError> {
        self.inner.case_owner(case_id)
    }
}

pub(super) struct StubVerification {
    pub(super) license_valid: bool,
    pub(super) education_valid: bool,
}

impl VerificationPort for StubVerification {
    fn verify_license(&self, _number: &str, _state: &str) -> Result<bool, VerificationError> {
        Ok(self.license_valid)
    }

    fn verify_education(
        &self,
        _institution: &str,
        _degree: &str,
    ) -> Result<bool, VerificationError> {
        Ok(self.education_valid)
    }
}

pub(super) struct OfflineVerification;

impl VerificationPort for OfflineVerification {
    fn verify_license(&self, _number: &str, _state: &str) -> Result<bool, VerificationError> {
        Err(VerificationError::TimedOut(30))
    }

    fn verify_education(
        &self,
        _institution: &str,
        _degree: &str,
    ) -> Result<bool, VerificationError> {
        Err(VerificationError::Unavailable("registry maintenance".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
