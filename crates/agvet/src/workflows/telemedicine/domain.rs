use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for registered veterinarians.
    VeterinarianId
);
string_id!(
    /// System-wide unique case identifier supplied by case intake.
    CaseId
);
string_id!(TaskId);
string_id!(NotificationId);
string_id!(AlertId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

/// A practice area the veterinarian is qualified in. `topic` is an opaque tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialization {
    pub topic: String,
    pub experience_level: ExperienceLevel,
    pub years_experience: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentLevel {
    HighSchool,
    Undergraduate,
    Graduate,
    Professional,
    ContinuingEducation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationType {
    Video,
    Phone,
    Chat,
    OnSite,
}

impl ConsultationType {
    /// Calendar block reserved when a case of this type is scheduled.
    pub fn expected_duration(self) -> Duration {
        match self {
            Self::Video => Duration::minutes(45),
            Self::Phone | Self::Chat => Duration::minutes(30),
            Self::OnSite => Duration::minutes(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Routine,
    Urgent,
    Emergency,
}

/// Half-open window `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySchedule {
    pub available: bool,
    pub slots: Vec<TimeSlot>,
}

impl DailySchedule {
    pub fn open(slots: Vec<TimeSlot>) -> Self {
        Self {
            available: true,
            slots,
        }
    }

    pub fn covers(&self, time: NaiveTime) -> bool {
        self.available && self.slots.iter().any(|slot| slot.contains(time))
    }
}

/// Seven daily schedules indexed Monday first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    days: [DailySchedule; 7],
}

impl WeeklySchedule {
    pub fn new(days: [DailySchedule; 7]) -> Self {
        Self { days }
    }

    /// Same slots Monday through Friday, weekend closed.
    pub fn weekdays(slots: Vec<TimeSlot>) -> Self {
        let mut schedule = Self::default();
        for day in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ] {
            schedule.set(day, DailySchedule::open(slots.clone()));
        }
        schedule
    }

    pub fn every_day(slots: Vec<TimeSlot>) -> Self {
        Self {
            days: std::array::from_fn(|_| DailySchedule::open(slots.clone())),
        }
    }

    pub fn day(&self, weekday: Weekday) -> &DailySchedule {
        &self.days[weekday.num_days_from_monday() as usize]
    }

    pub fn set(&mut self, weekday: Weekday, schedule: DailySchedule) {
        self.days[weekday.num_days_from_monday() as usize] = schedule;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub reason: String,
}

impl BlackoutPeriod {
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyAvailability {
    pub available: bool,
    pub response_time_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub weekly_schedule: WeeklySchedule,
    #[serde(default)]
    pub blackout_periods: Vec<BlackoutPeriod>,
    #[serde(default)]
    pub emergency: EmergencyAvailability,
    pub max_cases_per_day: u32,
}

impl Availability {
    pub fn in_blackout(&self, at: DateTime<Utc>) -> bool {
        self.blackout_periods.iter().any(|period| period.covers(at))
    }

    /// Whether the weekly schedule has an open slot covering `at`, ignoring load.
    pub fn has_slot_at(&self, at: DateTime<Utc>) -> bool {
        !self.in_blackout(at) && self.weekly_schedule.day(at.weekday()).covers(at.time())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub student_levels: BTreeSet<StudentLevel>,
    #[serde(default)]
    pub educational_focus: BTreeSet<String>,
    #[serde(default)]
    pub consultation_types: BTreeSet<ConsultationType>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSatisfaction {
    pub overall_rating: f64,
    pub total_ratings: u32,
}

/// Rolling statistics maintained by the performance monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_consultations: u32,
    pub completed_consultations: u32,
    pub average_response_time_minutes: f64,
    pub response_time_commitment_minutes: f64,
    pub client_satisfaction: ClientSatisfaction,
}

impl PerformanceMetrics {
    pub fn with_commitment(response_time_commitment_minutes: f64) -> Self {
        Self {
            total_consultations: 0,
            completed_consultations: 0,
            average_response_time_minutes: 0.0,
            response_time_commitment_minutes,
            client_satisfaction: ClientSatisfaction::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VeterinarianStatus {
    PendingVerification,
    Active,
    Inactive,
    Suspended,
    UnderReview,
    Deactivated,
}

impl VeterinarianStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingVerification => "pending_verification",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
            Self::UnderReview => "under_review",
            Self::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for VeterinarianStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub number: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationInfo {
    pub institution: String,
    pub degree: String,
    pub graduation_year: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VeterinarianProfile {
    pub id: VeterinarianId,
    pub name: String,
    pub email: String,
    pub license: LicenseInfo,
    pub education: EducationInfo,
    pub specializations: Vec<Specialization>,
    pub availability: Availability,
    pub preferences: Preferences,
    pub performance: PerformanceMetrics,
    pub status: VeterinarianStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VeterinarianProfile {
    pub fn has_specialty(&self, topic: &str) -> bool {
        self.specializations
            .iter()
            .any(|specialization| specialization.topic == topic)
    }
}

/// Registration payload accepted by the profile store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVeterinarian {
    pub id: VeterinarianId,
    pub name: String,
    pub email: String,
    pub license: LicenseInfo,
    pub education: EducationInfo,
    pub specializations: Vec<Specialization>,
    pub availability: Availability,
    #[serde(default)]
    pub preferences: Preferences,
    pub response_time_commitment_minutes: f64,
}

/// What a case needs from the veterinarian that takes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRequirements {
    pub specialty: String,
    pub urgency: UrgencyLevel,
    pub student_level: StudentLevel,
    #[serde(default)]
    pub educational_objectives: Vec<String>,
    pub consultation_type: ConsultationType,
    pub scheduled_time: DateTime<Utc>,
}

/// Immutable case payload submitted through intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRequest {
    pub case_id: CaseId,
    pub summary: String,
    pub requirements: CaseRequirements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Scheduled,
    InProgress,
    AwaitingDocumentation,
    Completed,
}

impl CaseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::AwaitingDocumentation => "awaiting_documentation",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCase {
    pub request: CaseRequest,
    pub status: CaseStatus,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActiveCase {
    pub fn case_id(&self) -> &CaseId {
        &self.request.case_id
    }
}

/// A case offered to the veterinarian but not yet claimed by anyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCase {
    pub request: CaseRequest,
    pub offered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub case_id: CaseId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub consultation_type: ConsultationType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewCase,
    UrgentCase,
    CaseOffer,
    PerformanceAlert,
    OnboardingUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub case_id: Option<CaseId>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Documentation,
    EducationalFollowUp,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub title: String,
    pub description: String,
    pub case_id: Option<CaseId>,
    pub priority: Priority,
    pub due_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Caller-supplied task definition for `add_task`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub case_id: Option<CaseId>,
    pub priority: Priority,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ResponseTime,
    Satisfaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAlert {
    pub id: AlertId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub observed: f64,
    pub threshold: f64,
    pub raised_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PerformanceAlert {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Per-veterinarian case and task state. Records are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub vet_id: VeterinarianId,
    pub current_cases: Vec<ActiveCase>,
    pub pending_cases: Vec<PendingCase>,
    pub schedule: Vec<ScheduleEntry>,
    pub notifications: Vec<Notification>,
    pub tasks: Vec<WorkflowTask>,
    pub alerts: Vec<PerformanceAlert>,
}

impl WorkflowState {
    pub fn new(vet_id: VeterinarianId) -> Self {
        Self {
            vet_id,
            current_cases: Vec::new(),
            pending_cases: Vec::new(),
            schedule: Vec::new(),
            notifications: Vec::new(),
            tasks: Vec::new(),
            alerts: Vec::new(),
        }
    }

    pub fn current_load(&self) -> u32 {
        self.current_cases.len() as u32
    }

    pub fn case(&self, case_id: &CaseId) -> Option<&ActiveCase> {
        self.current_cases
            .iter()
            .find(|case| case.case_id() == case_id)
    }

    pub fn task(&self, task_id: &TaskId) -> Option<&WorkflowTask> {
        self.tasks.iter().find(|task| &task.id == task_id)
    }

    pub fn is_offered(&self, case_id: &CaseId) -> bool {
        self.pending_cases
            .iter()
            .any(|pending| &pending.request.case_id == case_id)
    }

    /// Drop a pending offer; returns whether one was present.
    pub fn withdraw_offer(&mut self, case_id: &CaseId) -> bool {
        let before = self.pending_cases.len();
        self.pending_cases
            .retain(|pending| &pending.request.case_id != case_id);
        self.pending_cases.len() != before
    }

    pub fn open_alert(&self, kind: AlertKind) -> Option<&PerformanceAlert> {
        self.alerts
            .iter()
            .find(|alert| alert.kind == kind && alert.is_open())
    }

    pub fn open_tasks(&self) -> impl Iterator<Item = &WorkflowTask> {
        self.tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Pending)
    }
}
