//! Fixed-order onboarding state machine.
//!
//! Exactly one step is worked at a time: the current step is the first step that has not been
//! completed. Document uploads are tracked per step and never change a step's status; status
//! changes arrive as explicit outcomes, which may come back from slow external verification long
//! after the documents were uploaded.

mod steps;

pub use steps::OnboardingStep;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::VeterinarianId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
    RequiresReview,
}

impl StepStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RequiresReview => "requires_review",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedDocument {
    pub name: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    pub status: StepStatus,
    pub documents_required: Vec<String>,
    pub documents_submitted: Vec<SubmittedDocument>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub attempts: u32,
}

impl StepProgress {
    fn for_step(step: OnboardingStep) -> Self {
        Self {
            status: StepStatus::NotStarted,
            documents_required: step
                .documents_required()
                .iter()
                .map(|name| name.to_string())
                .collect(),
            documents_submitted: Vec::new(),
            started_at: None,
            completed_at: None,
            notes: None,
            attempts: 0,
        }
    }

    fn begin(&mut self, now: DateTime<Utc>) {
        self.status = StepStatus::InProgress;
        self.started_at = Some(now);
        self.attempts += 1;
    }

    pub fn missing_documents(&self) -> Vec<&str> {
        self.documents_required
            .iter()
            .filter(|required| {
                !self
                    .documents_submitted
                    .iter()
                    .any(|submitted| &submitted.name == *required)
            })
            .map(String::as_str)
            .collect()
    }
}

/// Decision recorded against the current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed {
        #[serde(default)]
        notes: Option<String>,
    },
    Failed {
        notes: String,
    },
    RequiresReview {
        notes: String,
    },
}

impl StepOutcome {
    pub fn completed() -> Self {
        Self::Completed { notes: None }
    }

    pub fn failed(notes: impl Into<String>) -> Self {
        Self::Failed {
            notes: notes.into(),
        }
    }
}

/// Step-level pass/fail feedback returned to the onboarding caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: OnboardingStep,
    pub status: StepStatus,
    pub notes: Option<String>,
    pub current_step: OnboardingStep,
    pub onboarding_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OnboardingError {
    #[error("step {step} cannot change while {current} is the current onboarding step")]
    OutOfOrder {
        step: OnboardingStep,
        current: OnboardingStep,
    },
    #[error("step {0} is already completed")]
    AlreadyCompleted(OnboardingStep),
    #[error("step {0} failed; retry it before recording a new outcome")]
    AwaitingRetry(OnboardingStep),
    #[error("step {step} cannot be retried from {status}")]
    NotRetryable {
        step: OnboardingStep,
        status: StepStatus,
    },
    #[error("document name must not be empty")]
    EmptyDocumentName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingProgress {
    pub vet_id: VeterinarianId,
    pub current_step: OnboardingStep,
    pub completed_steps: Vec<OnboardingStep>,
    pub step_progress: BTreeMap<OnboardingStep, StepProgress>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OnboardingProgress {
    /// Fresh progress with the first step already in progress.
    pub fn start(vet_id: VeterinarianId, now: DateTime<Utc>) -> Self {
        let mut step_progress: BTreeMap<OnboardingStep, StepProgress> = OnboardingStep::ordered()
            .into_iter()
            .map(|step| (step, StepProgress::for_step(step)))
            .collect();

        let first = OnboardingStep::first();
        if let Some(progress) = step_progress.get_mut(&first) {
            progress.begin(now);
        }

        Self {
            vet_id,
            current_step: first,
            completed_steps: Vec::new(),
            step_progress,
            started_at: now,
            completed_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn step(&self, step: OnboardingStep) -> Option<&StepProgress> {
        self.step_progress.get(&step)
    }

    pub fn status_of(&self, step: OnboardingStep) -> StepStatus {
        self.step(step)
            .map(|progress| progress.status)
            .unwrap_or(StepStatus::NotStarted)
    }

    fn progress_mut(&mut self, step: OnboardingStep) -> &mut StepProgress {
        self.step_progress
            .entry(step)
            .or_insert_with(|| StepProgress::for_step(step))
    }

    fn ensure_current(&self, step: OnboardingStep) -> Result<(), OnboardingError> {
        if self.completed_steps.contains(&step) {
            return Err(OnboardingError::AlreadyCompleted(step));
        }
        if step != self.current_step {
            return Err(OnboardingError::OutOfOrder {
                step,
                current: self.current_step,
            });
        }
        Ok(())
    }

    /// Record an outcome for the current step, starting the next one on completion.
    pub fn advance(
        &mut self,
        step: OnboardingStep,
        outcome: StepOutcome,
        now: DateTime<Utc>,
    ) -> Result<StepReport, OnboardingError> {
        self.ensure_current(step)?;

        let progress = self.progress_mut(step);
        match progress.status {
            StepStatus::Failed => return Err(OnboardingError::AwaitingRetry(step)),
            StepStatus::Completed => return Err(OnboardingError::AlreadyCompleted(step)),
            StepStatus::NotStarted => progress.begin(now),
            StepStatus::InProgress | StepStatus::RequiresReview => {}
        }

        match outcome {
            StepOutcome::Completed { notes } => {
                progress.status = StepStatus::Completed;
                progress.completed_at = Some(now);
                progress.notes = notes;
                self.completed_steps.push(step);

                match step.next() {
                    Some(next) => {
                        if !self.completed_steps.contains(&next) {
                            self.progress_mut(next).begin(now);
                        }
                        self.current_step = next;
                    }
                    None => self.completed_at = Some(now),
                }
            }
            StepOutcome::Failed { notes } => {
                progress.status = StepStatus::Failed;
                progress.notes = Some(notes);
            }
            StepOutcome::RequiresReview { notes } => {
                progress.status = StepStatus::RequiresReview;
                progress.notes = Some(notes);
            }
        }

        Ok(self.report(step))
    }

    /// Return a failed or escalated step to `in_progress` for resubmission.
    pub fn retry(
        &mut self,
        step: OnboardingStep,
        now: DateTime<Utc>,
    ) -> Result<StepReport, OnboardingError> {
        self.ensure_current(step)?;

        let progress = self.progress_mut(step);
        match progress.status {
            StepStatus::Failed | StepStatus::RequiresReview => {
                progress.begin(now);
                progress.notes = None;
            }
            status => return Err(OnboardingError::NotRetryable { step, status }),
        }

        Ok(self.report(step))
    }

    pub fn submit_document(
        &mut self,
        step: OnboardingStep,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OnboardingError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OnboardingError::EmptyDocumentName);
        }
        if self.completed_steps.contains(&step) {
            return Err(OnboardingError::AlreadyCompleted(step));
        }

        self.progress_mut(step)
            .documents_submitted
            .push(SubmittedDocument {
                name: name.to_string(),
                submitted_at: now,
            });
        Ok(())
    }

    /// Move a verification step that has waited longer than `timeout` to manual review.
    pub fn escalate_stale(&mut self, now: DateTime<Utc>, timeout: Duration) -> Option<StepReport> {
        let step = self.current_step;
        if self.is_complete() || !step.is_external_verification() {
            return None;
        }

        let progress = self.progress_mut(step);
        let started_at = progress.started_at?;
        if progress.status != StepStatus::InProgress || now - started_at < timeout {
            return None;
        }

        progress.status = StepStatus::RequiresReview;
        progress.notes = Some(format!(
            "verification pending for more than {} days",
            timeout.num_days()
        ));
        Some(self.report(step))
    }

    pub fn report(&self, step: OnboardingStep) -> StepReport {
        let progress = self.step(step);
        StepReport {
            step,
            status: self.status_of(step),
            notes: progress.and_then(|progress| progress.notes.clone()),
            current_step: self.current_step,
            onboarding_complete: self.is_complete(),
        }
    }
}
