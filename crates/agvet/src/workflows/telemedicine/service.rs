use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{
    ActiveCase, AlertId, CaseId, CaseRequest, CaseRequirements, CaseStatus, NewTask, Notification,
    NotificationId, PerformanceAlert, PerformanceMetrics, TaskId, VeterinarianId,
    VeterinarianStatus, WorkflowState, WorkflowTask,
};
use super::lifecycle::{TaskCompletion, TransitionError, WorkflowConfig, WorkflowManager};
use super::locks::AggregateLocks;
use super::matching::{CandidateSnapshot, MatchResult, MatchingConfig, MatchingEngine};
use super::onboarding::{
    OnboardingError, OnboardingProgress, OnboardingStep, StepOutcome, StepProgress, StepReport,
    StepStatus,
};
use super::performance::{self, PerformanceMonitor, PerformanceThresholds};
use super::profiles::ProfileStore;
use super::repository::{
    NotificationSender, RepositoryError, VerificationError, VerificationPort, VeterinarianRecord,
    VeterinarianRepository,
};
use super::validation::{self, ValidationError};

/// Tunables for matching, alerting, task scheduling and verification escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub matching: MatchingConfig,
    pub thresholds: PerformanceThresholds,
    pub workflow: WorkflowConfig,
    pub verification_timeout_days: i64,
}

/// Upper bound for the verification escalation timeout, in days.
pub const MAX_VERIFICATION_TIMEOUT_DAYS: i64 = 365;

impl EngineConfig {
    /// Escalation timeout, kept within 1 day and `MAX_VERIFICATION_TIMEOUT_DAYS`.
    pub fn verification_timeout(&self) -> Duration {
        Duration::days(
            self.verification_timeout_days
                .clamp(1, MAX_VERIFICATION_TIMEOUT_DAYS),
        )
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matching: MatchingConfig::default(),
            thresholds: PerformanceThresholds::default(),
            workflow: WorkflowConfig::default(),
            verification_timeout_days: 14,
        }
    }
}

/// Outcome of a case status change, including follow-up tasks and any alerts it tripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseUpdate {
    pub case: ActiveCase,
    pub tasks_created: Vec<WorkflowTask>,
    pub alerts_raised: Vec<PerformanceAlert>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingUpdate {
    pub metrics: PerformanceMetrics,
    pub alerts_raised: Vec<PerformanceAlert>,
}

/// Service composing the profile store, onboarding, matching, workflow and monitoring rules.
///
/// Every mutation runs as one read-modify-write over a single veterinarian's aggregate;
/// notifications are handed to the sender only after that write succeeded.
pub struct TelemedicineService<R, N> {
    profiles: ProfileStore<R>,
    repository: Arc<R>,
    notifier: Arc<N>,
    matching: MatchingEngine,
    workflow: WorkflowManager,
    monitor: PerformanceMonitor,
    verification_timeout: Duration,
}

impl<R, N> TelemedicineService<R, N>
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, config: EngineConfig) -> Self {
        let locks = Arc::new(AggregateLocks::default());
        let verification_timeout = config.verification_timeout();
        Self {
            profiles: ProfileStore::new(Arc::clone(&repository), locks),
            repository,
            notifier,
            matching: MatchingEngine::new(config.matching),
            workflow: WorkflowManager::new(config.workflow),
            monitor: PerformanceMonitor::new(config.thresholds),
            verification_timeout,
        }
    }

    pub fn profiles(&self) -> &ProfileStore<R> {
        &self.profiles
    }

    /// Ranked shortlist for a case. Reads a snapshot of active veterinarians without locking.
    pub fn find_matches(
        &self,
        requirements: &CaseRequirements,
    ) -> Result<Vec<MatchResult>, ServiceError> {
        validation::validate_requirements(requirements)?;

        let candidates: Vec<CandidateSnapshot> = self
            .repository
            .list_active()?
            .into_iter()
            .map(|record| CandidateSnapshot {
                current_load: record.current_load(),
                profile: record.profile,
            })
            .collect();

        let shortlist = self.matching.rank(&candidates, requirements);
        info!(
            specialty = %requirements.specialty,
            candidates = candidates.len(),
            shortlisted = shortlist.len(),
            "case matching completed"
        );
        Ok(shortlist)
    }

    /// Give `vet_id` ownership of a case. The case id can be claimed only once.
    pub fn assign(
        &self,
        vet_id: &VeterinarianId,
        request: CaseRequest,
    ) -> Result<ActiveCase, ServiceError> {
        validation::validate_case(&request)?;
        let case_id = request.case_id.clone();

        let mut claimed = false;
        let outcome = self.profiles.mutate(vet_id, |record| {
            ensure_accepting_cases(record)?;
            self.repository
                .claim_case(&case_id, vet_id)
                .map_err(ServiceError::from_claim)?;
            claimed = true;

            let (case, notification) =
                self.workflow
                    .assign(record.workflow_mut(), request, Utc::now());
            record.profile.performance.total_consultations += 1;
            Ok((case, notification))
        });

        let ((case, notification), _) = match outcome {
            Ok(done) => done,
            Err(err) => {
                if claimed {
                    if let Err(release) = self.repository.release_case(&case_id, vet_id) {
                        warn!(vet_id = %vet_id, case_id = %case_id, error = %release, "failed to release case claim");
                    }
                }
                return Err(err);
            }
        };

        info!(vet_id = %vet_id, case_id = %case_id, "case assigned");
        self.dispatch(vet_id, &[notification]);
        self.withdraw_offers(&case_id, vet_id);
        Ok(case)
    }

    /// Put an unowned case in front of a veterinarian without claiming it.
    pub fn offer_case(
        &self,
        vet_id: &VeterinarianId,
        request: CaseRequest,
    ) -> Result<Notification, ServiceError> {
        validation::validate_case(&request)?;
        let case_id = request.case_id.clone();
        let (notification, _) = self.profiles.mutate(vet_id, |record| {
            if let Some(owner) = self.repository.case_owner(&request.case_id)? {
                return Err(ServiceError::CaseAlreadyAssigned {
                    case_id: request.case_id,
                    owner,
                });
            }
            Ok(self
                .workflow
                .offer(record.workflow_mut(), request, Utc::now())?)
        })?;

        debug!(vet_id = %vet_id, case_id = %case_id, "case offered");
        self.dispatch(vet_id, std::slice::from_ref(&notification));
        Ok(notification)
    }

    /// Move a case forward; completion feeds the response time to the performance monitor.
    pub fn update_case_status(
        &self,
        vet_id: &VeterinarianId,
        case_id: &CaseId,
        status: CaseStatus,
    ) -> Result<CaseUpdate, ServiceError> {
        let ((update, notifications), _) = self.profiles.mutate(vet_id, |record| {
            let now = Utc::now();
            let transition = self
                .workflow
                .transition(record.workflow_mut(), case_id, status, now)?;

            let mut alerts_raised = Vec::new();
            let mut notifications = Vec::new();
            if let Some(minutes) = transition.response_minutes {
                self.monitor
                    .record_consultation(&mut record.profile.performance, minutes);
                (alerts_raised, notifications) = self.evaluate_alerts(record, now);
            }

            let update = CaseUpdate {
                case: transition.case,
                tasks_created: transition.tasks_created,
                alerts_raised,
            };
            Ok((update, notifications))
        })?;

        info!(vet_id = %vet_id, case_id = %case_id, status = %status, "case status updated");
        self.dispatch(vet_id, &notifications);
        Ok(update)
    }

    pub fn add_task(
        &self,
        vet_id: &VeterinarianId,
        task: NewTask,
    ) -> Result<WorkflowTask, ServiceError> {
        validation::validate_task(&task)?;
        let (task, _) = self.profiles.mutate(vet_id, |record| {
            Ok(self
                .workflow
                .add_task(record.workflow_mut(), task, Utc::now()))
        })?;
        debug!(vet_id = %vet_id, task_id = %task.id, "task added");
        Ok(task)
    }

    pub fn complete_task(
        &self,
        vet_id: &VeterinarianId,
        task_id: &TaskId,
    ) -> Result<TaskCompletion, ServiceError> {
        let (completion, _) = self.profiles.mutate(vet_id, |record| {
            Ok(self
                .workflow
                .complete_task(record.workflow_mut(), task_id, Utc::now())?)
        })?;
        if completion.newly_completed {
            debug!(vet_id = %vet_id, task_id = %task_id, "task completed");
        }
        Ok(completion)
    }

    pub fn mark_notification_read(
        &self,
        vet_id: &VeterinarianId,
        notification_id: &NotificationId,
    ) -> Result<Notification, ServiceError> {
        let (notification, _) = self.profiles.mutate(vet_id, |record| {
            Ok(self
                .workflow
                .mark_notification_read(record.workflow_mut(), notification_id)?)
        })?;
        Ok(notification)
    }

    /// Fold a client rating (1 to 5) into the satisfaction average and re-check alerts.
    pub fn record_rating(
        &self,
        vet_id: &VeterinarianId,
        rating: f64,
    ) -> Result<RatingUpdate, ServiceError> {
        validation::validate_rating(rating)?;
        let ((update, notifications), _) = self.profiles.mutate(vet_id, |record| {
            self.monitor
                .record_rating(&mut record.profile.performance, rating);
            let (alerts_raised, notifications) = self.evaluate_alerts(record, Utc::now());
            let update = RatingUpdate {
                metrics: record.profile.performance,
                alerts_raised,
            };
            Ok((update, notifications))
        })?;

        debug!(
            vet_id = %vet_id,
            overall_rating = update.metrics.client_satisfaction.overall_rating,
            "rating recorded"
        );
        self.dispatch(vet_id, &notifications);
        Ok(update)
    }

    pub fn resolve_alert(
        &self,
        vet_id: &VeterinarianId,
        alert_id: &AlertId,
    ) -> Result<PerformanceAlert, ServiceError> {
        let (alert, _) = self.profiles.mutate(vet_id, |record| {
            performance::resolve_alert(record.workflow_mut(), alert_id, Utc::now())
                .ok_or_else(|| ServiceError::not_found("alert", alert_id))
        })?;
        Ok(alert)
    }

    /// Current workflow; offers for cases another veterinarian now owns are left out.
    pub fn workflow(&self, vet_id: &VeterinarianId) -> Result<WorkflowState, ServiceError> {
        let mut workflow = self.profiles.record(vet_id)?.workflow_view();
        let mut pending = Vec::with_capacity(workflow.pending_cases.len());
        for offer in workflow.pending_cases {
            match self.repository.case_owner(&offer.request.case_id)? {
                Some(owner) if &owner != vet_id => {}
                _ => pending.push(offer),
            }
        }
        workflow.pending_cases = pending;
        Ok(workflow)
    }

    pub fn onboarding(&self, vet_id: &VeterinarianId) -> Result<OnboardingProgress, ServiceError> {
        Ok(self.profiles.record(vet_id)?.onboarding)
    }

    /// Record an outcome for the current onboarding step.
    ///
    /// Completing the final step activates a profile that is still pending verification.
    pub fn advance_onboarding(
        &self,
        vet_id: &VeterinarianId,
        step: OnboardingStep,
        outcome: StepOutcome,
    ) -> Result<StepReport, ServiceError> {
        let ((report, notifications), _) = self.profiles.mutate(vet_id, |record| {
            let now = Utc::now();
            let report = record.onboarding.advance(step, outcome, now)?;
            let notifications = self.after_step(record, &report, now);
            Ok((report, notifications))
        })?;

        info!(
            vet_id = %vet_id,
            step = %step,
            status = %report.status,
            current_step = %report.current_step,
            "onboarding step recorded"
        );
        if report.onboarding_complete {
            info!(vet_id = %vet_id, "onboarding complete; veterinarian active");
        }
        self.dispatch(vet_id, &notifications);
        Ok(report)
    }

    pub fn retry_onboarding_step(
        &self,
        vet_id: &VeterinarianId,
        step: OnboardingStep,
    ) -> Result<StepReport, ServiceError> {
        let (report, _) = self.profiles.mutate(vet_id, |record| {
            Ok(record.onboarding.retry(step, Utc::now())?)
        })?;
        info!(vet_id = %vet_id, step = %step, "onboarding step reopened");
        Ok(report)
    }

    /// Track an uploaded document. Never changes the step's status.
    pub fn submit_onboarding_document(
        &self,
        vet_id: &VeterinarianId,
        step: OnboardingStep,
        name: &str,
    ) -> Result<StepProgress, ServiceError> {
        let (progress, _) = self.profiles.mutate(vet_id, |record| {
            record.onboarding.submit_document(step, name, Utc::now())?;
            record
                .onboarding
                .step(step)
                .cloned()
                .ok_or_else(|| ServiceError::not_found("onboarding step", step))
        })?;
        debug!(vet_id = %vet_id, step = %step, document = name.trim(), "onboarding document submitted");
        Ok(progress)
    }

    /// Map a verification provider's verdict onto the matching onboarding step.
    pub fn record_verification(
        &self,
        vet_id: &VeterinarianId,
        step: OnboardingStep,
        verified: bool,
    ) -> Result<StepReport, ServiceError> {
        if !step.is_external_verification() {
            return Err(ValidationError::NotVerificationStep(step).into());
        }

        let outcome = if verified {
            StepOutcome::Completed {
                notes: Some("verified by provider".to_string()),
            }
        } else {
            StepOutcome::failed(format!(
                "{} could not be confirmed by the verification provider",
                step.label()
            ))
        };
        self.advance_onboarding(vet_id, step, outcome)
    }

    /// Ask the provider to confirm the license on file. The call runs without any lock held.
    pub fn verify_license<P>(
        &self,
        vet_id: &VeterinarianId,
        port: &P,
    ) -> Result<StepReport, ServiceError>
    where
        P: VerificationPort + ?Sized,
    {
        let profile = self.profiles.get(vet_id)?;
        let verified = port
            .verify_license(&profile.license.number, &profile.license.state)
            .inspect_err(|err| {
                warn!(vet_id = %vet_id, error = %err, "license verification unavailable")
            })?;
        self.record_verification(vet_id, OnboardingStep::LicenseVerification, verified)
    }

    pub fn verify_education<P>(
        &self,
        vet_id: &VeterinarianId,
        port: &P,
    ) -> Result<StepReport, ServiceError>
    where
        P: VerificationPort + ?Sized,
    {
        let profile = self.profiles.get(vet_id)?;
        let verified = port
            .verify_education(&profile.education.institution, &profile.education.degree)
            .inspect_err(|err| {
                warn!(vet_id = %vet_id, error = %err, "education verification unavailable")
            })?;
        self.record_verification(vet_id, OnboardingStep::EducationVerification, verified)
    }

    /// Send verification steps pending longer than the configured timeout to manual review.
    pub fn escalate_stale_verifications(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(VeterinarianId, StepReport)>, ServiceError> {
        let timeout = self.verification_timeout;
        let stale: Vec<VeterinarianId> = self
            .repository
            .list()?
            .into_iter()
            .filter(|record| {
                record
                    .onboarding
                    .clone()
                    .escalate_stale(now, timeout)
                    .is_some()
            })
            .map(|record| record.profile.id)
            .collect();

        let mut escalated = Vec::with_capacity(stale.len());
        for vet_id in stale {
            let (result, _) = self.profiles.mutate(&vet_id, |record| {
                Ok(record.onboarding.escalate_stale(now, timeout).map(|report| {
                    let notifications = self.after_step(record, &report, now);
                    (report, notifications)
                }))
            })?;

            if let Some((report, notifications)) = result {
                warn!(vet_id = %vet_id, step = %report.step, "verification escalated to review");
                self.dispatch(&vet_id, &notifications);
                escalated.push((vet_id, report));
            }
        }
        Ok(escalated)
    }

    fn after_step(
        &self,
        record: &mut VeterinarianRecord,
        report: &StepReport,
        now: DateTime<Utc>,
    ) -> Vec<Notification> {
        if report.onboarding_complete
            && record.profile.status == VeterinarianStatus::PendingVerification
        {
            record.profile.status = VeterinarianStatus::Active;
        }

        let noteworthy = report.onboarding_complete
            || matches!(
                report.status,
                StepStatus::Failed | StepStatus::RequiresReview
            );
        if noteworthy {
            vec![self
                .workflow
                .notify_onboarding(record.workflow_mut(), report, now)]
        } else {
            Vec::new()
        }
    }

    fn evaluate_alerts(
        &self,
        record: &mut VeterinarianRecord,
        now: DateTime<Utc>,
    ) -> (Vec<PerformanceAlert>, Vec<Notification>) {
        let metrics = record.profile.performance;
        let workflow = record.workflow_mut();
        let raised = self.monitor.evaluate(&metrics, workflow, now);

        let notifications = raised
            .iter()
            .map(|alert| {
                warn!(
                    vet_id = %workflow.vet_id,
                    alert_id = %alert.id,
                    observed = alert.observed,
                    threshold = alert.threshold,
                    "performance alert raised"
                );
                self.workflow.notify_alert(workflow, alert, now)
            })
            .collect();
        (raised, notifications)
    }

    /// Remove an assigned case from every other veterinarian's pending offers.
    fn withdraw_offers(&self, case_id: &CaseId, owner: &VeterinarianId) {
        let holders: Vec<VeterinarianId> = match self.repository.list() {
            Ok(records) => records
                .into_iter()
                .filter(|record| {
                    record.id() != owner
                        && record
                            .workflow
                            .as_ref()
                            .is_some_and(|workflow| workflow.is_offered(case_id))
                })
                .map(|record| record.profile.id)
                .collect(),
            Err(err) => {
                warn!(case_id = %case_id, error = %err, "failed to list offers to withdraw");
                return;
            }
        };

        for vet_id in holders {
            match self
                .profiles
                .mutate(&vet_id, |record| Ok(record.workflow_mut().withdraw_offer(case_id)))
            {
                Ok((true, _)) => debug!(vet_id = %vet_id, case_id = %case_id, "offer withdrawn"),
                Ok((false, _)) => {}
                Err(err) => warn!(
                    vet_id = %vet_id,
                    case_id = %case_id,
                    error = %err,
                    "failed to withdraw offer"
                ),
            }
        }
    }

    fn dispatch(&self, vet_id: &VeterinarianId, notifications: &[Notification]) {
        for notification in notifications {
            match self.notifier.send(vet_id, notification) {
                Ok(()) => {
                    debug!(vet_id = %vet_id, notification_id = %notification.id, "notification sent")
                }
                Err(err) => warn!(
                    vet_id = %vet_id,
                    notification_id = %notification.id,
                    error = %err,
                    "notification dispatch failed"
                ),
            }
        }
    }
}

fn ensure_accepting_cases(record: &VeterinarianRecord) -> Result<(), ServiceError> {
    if record.is_active() {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition(format!(
            "veterinarian {} is {} and cannot take cases",
            record.id(),
            record.profile.status
        )))
    }
}

/// Error raised by the telemedicine service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("veterinarian {0} is already registered")]
    AlreadyRegistered(VeterinarianId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("case {case_id} is already assigned to {owner}")]
    CaseAlreadyAssigned {
        case_id: CaseId,
        owner: VeterinarianId,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl ServiceError {
    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    fn from_claim(err: RepositoryError) -> Self {
        match err {
            RepositoryError::CaseClaimed { case_id, owner } => {
                Self::CaseAlreadyAssigned { case_id, owner }
            }
            other => Self::Repository(other),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::CaseNotFound(case_id) => Self::not_found("case", case_id),
            TransitionError::TaskNotFound(task_id) => Self::not_found("task", task_id),
            TransitionError::NotificationNotFound(id) => Self::not_found("notification", id),
            other => Self::InvalidTransition(other.to_string()),
        }
    }
}

impl From<OnboardingError> for ServiceError {
    fn from(err: OnboardingError) -> Self {
        match err {
            OnboardingError::EmptyDocumentName => {
                Self::Validation(ValidationError::MissingField("document name"))
            }
            other => Self::InvalidTransition(other.to_string()),
        }
    }
}
