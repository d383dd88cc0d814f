use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActiveCase, AlertSeverity, CaseId, CaseRequest, CaseStatus, NewTask, Notification,
    NotificationId, NotificationKind, PendingCase, PerformanceAlert, Priority, ScheduleEntry,
    TaskId, TaskKind, TaskStatus, UrgencyLevel, WorkflowState, WorkflowTask,
};
use super::onboarding::StepReport;

/// Due-date offsets for the tasks generated when a consultation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub documentation_due_hours: i64,
    pub follow_up_due_days: i64,
}

/// Upper bound for the documentation due offset, in hours.
pub const MAX_DOCUMENTATION_DUE_HOURS: i64 = 24 * 30;
/// Upper bound for the educational follow-up due offset, in days.
pub const MAX_FOLLOW_UP_DUE_DAYS: i64 = 365;

impl WorkflowConfig {
    /// Documentation due offset, kept within 1 hour and `MAX_DOCUMENTATION_DUE_HOURS`.
    pub fn documentation_due(&self) -> Duration {
        Duration::hours(
            self.documentation_due_hours
                .clamp(1, MAX_DOCUMENTATION_DUE_HOURS),
        )
    }

    /// Follow-up due offset, kept within 1 day and `MAX_FOLLOW_UP_DUE_DAYS`.
    pub fn follow_up_due(&self) -> Duration {
        Duration::days(self.follow_up_due_days.clamp(1, MAX_FOLLOW_UP_DUE_DAYS))
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            documentation_due_hours: 2,
            follow_up_due_days: 7,
        }
    }
}

static TASK_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static NOTIFICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> TaskId {
    let id = TASK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TaskId(format!("task-{id:06}"))
}

fn next_notification_id() -> NotificationId {
    let id = NOTIFICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    NotificationId(format!("ntf-{id:06}"))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("case {0} is not in this veterinarian's current cases")]
    CaseNotFound(CaseId),
    #[error("case {case_id} cannot move from {from} to {to}")]
    OutOfOrder {
        case_id: CaseId,
        from: CaseStatus,
        to: CaseStatus,
    },
    #[error("case {0} is already on this veterinarian's workflow")]
    AlreadyOnWorkflow(CaseId),
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error("notification {0} not found")]
    NotificationNotFound(NotificationId),
}

/// Result of a case status change.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseTransition {
    pub case: ActiveCase,
    pub tasks_created: Vec<WorkflowTask>,
    /// Minutes from the later of assignment and booked time to start, set when the case completed.
    pub response_minutes: Option<f64>,
}

/// Booked consultations are measured from their slot, not from when they were assigned.
fn measure_response(case: &ActiveCase, completed_at: DateTime<Utc>) -> f64 {
    let due_from = case.assigned_at.max(case.request.requirements.scheduled_time);
    let responded_at = case.started_at.unwrap_or(completed_at);
    let seconds = (responded_at - due_from).num_seconds().max(0);
    seconds as f64 / 60.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskCompletion {
    pub task: WorkflowTask,
    pub newly_completed: bool,
}

/// Case lifecycle, task and notification rules over a single workflow state.
#[derive(Debug, Clone, Default)]
pub struct WorkflowManager {
    config: WorkflowConfig,
}

impl WorkflowManager {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Put a claimed case on the workflow as `scheduled` and build its notification.
    pub fn assign(
        &self,
        workflow: &mut WorkflowState,
        request: CaseRequest,
        now: DateTime<Utc>,
    ) -> (ActiveCase, Notification) {
        workflow.withdraw_offer(&request.case_id);

        let requirements = &request.requirements;
        workflow.schedule.push(ScheduleEntry {
            case_id: request.case_id.clone(),
            starts_at: requirements.scheduled_time,
            ends_at: requirements.scheduled_time
                + requirements.consultation_type.expected_duration(),
            consultation_type: requirements.consultation_type,
        });

        let notification = if requirements.urgency == UrgencyLevel::Emergency {
            Notification {
                id: next_notification_id(),
                kind: NotificationKind::UrgentCase,
                priority: Priority::Urgent,
                title: "Emergency case assigned".to_string(),
                message: format!(
                    "Emergency {} consultation: {}",
                    requirements.specialty, request.summary
                ),
                case_id: Some(request.case_id.clone()),
                created_at: now,
                read: false,
            }
        } else {
            Notification {
                id: next_notification_id(),
                kind: NotificationKind::NewCase,
                priority: match requirements.urgency {
                    UrgencyLevel::Urgent => Priority::High,
                    _ => Priority::Normal,
                },
                title: "New case assigned".to_string(),
                message: format!(
                    "{} consultation scheduled for {}: {}",
                    requirements.specialty,
                    requirements.scheduled_time.format("%Y-%m-%d %H:%M UTC"),
                    request.summary
                ),
                case_id: Some(request.case_id.clone()),
                created_at: now,
                read: false,
            }
        };

        let case = ActiveCase {
            request,
            status: CaseStatus::Scheduled,
            assigned_at: now,
            started_at: None,
            completed_at: None,
        };
        workflow.current_cases.push(case.clone());
        workflow.notifications.push(notification.clone());
        (case, notification)
    }

    /// Offer an unowned case; no ownership is taken.
    pub fn offer(
        &self,
        workflow: &mut WorkflowState,
        request: CaseRequest,
        now: DateTime<Utc>,
    ) -> Result<Notification, TransitionError> {
        if workflow.case(&request.case_id).is_some() || workflow.is_offered(&request.case_id) {
            return Err(TransitionError::AlreadyOnWorkflow(request.case_id));
        }

        let notification = Notification {
            id: next_notification_id(),
            kind: NotificationKind::CaseOffer,
            priority: Priority::Normal,
            title: "Case available".to_string(),
            message: format!(
                "{} consultation requested: {}",
                request.requirements.specialty, request.summary
            ),
            case_id: Some(request.case_id.clone()),
            created_at: now,
            read: false,
        };
        workflow.pending_cases.push(PendingCase {
            request,
            offered_at: now,
        });
        workflow.notifications.push(notification.clone());
        Ok(notification)
    }

    /// Move a case forward. Completion removes it and generates follow-up tasks.
    pub fn transition(
        &self,
        workflow: &mut WorkflowState,
        case_id: &CaseId,
        to: CaseStatus,
        now: DateTime<Utc>,
    ) -> Result<CaseTransition, TransitionError> {
        let index = workflow
            .current_cases
            .iter()
            .position(|case| case.case_id() == case_id)
            .ok_or_else(|| TransitionError::CaseNotFound(case_id.clone()))?;

        let case = &mut workflow.current_cases[index];
        if to <= case.status {
            return Err(TransitionError::OutOfOrder {
                case_id: case_id.clone(),
                from: case.status,
                to,
            });
        }

        case.status = to;
        if to != CaseStatus::Completed && case.started_at.is_none() {
            case.started_at = Some(now);
        }

        if to != CaseStatus::Completed {
            return Ok(CaseTransition {
                case: case.clone(),
                tasks_created: Vec::new(),
                response_minutes: None,
            });
        }

        let mut case = workflow.current_cases.remove(index);
        case.completed_at = Some(now);
        let response_minutes = measure_response(&case, now);

        let mut tasks_created = vec![WorkflowTask {
            id: next_task_id(),
            kind: TaskKind::Documentation,
            title: format!("Document consultation {}", case_id),
            description: "Complete consultation notes and treatment recommendations.".to_string(),
            case_id: Some(case_id.clone()),
            priority: Priority::High,
            due_at: now + self.config.documentation_due(),
            status: TaskStatus::Pending,
            created_at: now,
            completed_at: None,
        }];

        let objectives = &case.request.requirements.educational_objectives;
        if !objectives.is_empty() {
            tasks_created.push(WorkflowTask {
                id: next_task_id(),
                kind: TaskKind::EducationalFollowUp,
                title: format!("Educational follow-up for {}", case_id),
                description: format!("Review learning objectives: {}", objectives.join(", ")),
                case_id: Some(case_id.clone()),
                priority: Priority::Normal,
                due_at: now + self.config.follow_up_due(),
                status: TaskStatus::Pending,
                created_at: now,
                completed_at: None,
            });
        }

        workflow.tasks.extend(tasks_created.iter().cloned());

        Ok(CaseTransition {
            case,
            tasks_created,
            response_minutes: Some(response_minutes),
        })
    }

    pub fn add_task(
        &self,
        workflow: &mut WorkflowState,
        task: NewTask,
        now: DateTime<Utc>,
    ) -> WorkflowTask {
        let task = WorkflowTask {
            id: next_task_id(),
            kind: TaskKind::Custom,
            title: task.title,
            description: task.description,
            case_id: task.case_id,
            priority: task.priority,
            due_at: task.due_at,
            status: TaskStatus::Pending,
            created_at: now,
            completed_at: None,
        };
        workflow.tasks.push(task.clone());
        task
    }

    /// Completing an already completed task leaves it untouched.
    pub fn complete_task(
        &self,
        workflow: &mut WorkflowState,
        task_id: &TaskId,
        now: DateTime<Utc>,
    ) -> Result<TaskCompletion, TransitionError> {
        let task = workflow
            .tasks
            .iter_mut()
            .find(|task| &task.id == task_id)
            .ok_or_else(|| TransitionError::TaskNotFound(task_id.clone()))?;

        let newly_completed = task.status != TaskStatus::Completed;
        if newly_completed {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(now);
        }

        Ok(TaskCompletion {
            task: task.clone(),
            newly_completed,
        })
    }

    pub fn mark_notification_read(
        &self,
        workflow: &mut WorkflowState,
        notification_id: &NotificationId,
    ) -> Result<Notification, TransitionError> {
        let notification = workflow
            .notifications
            .iter_mut()
            .find(|notification| &notification.id == notification_id)
            .ok_or_else(|| TransitionError::NotificationNotFound(notification_id.clone()))?;
        notification.read = true;
        Ok(notification.clone())
    }

    /// Record a notification for a newly raised performance alert.
    pub fn notify_alert(
        &self,
        workflow: &mut WorkflowState,
        alert: &PerformanceAlert,
        now: DateTime<Utc>,
    ) -> Notification {
        let notification = Notification {
            id: next_notification_id(),
            kind: NotificationKind::PerformanceAlert,
            priority: match alert.severity {
                AlertSeverity::Critical => Priority::Urgent,
                AlertSeverity::Warning => Priority::High,
            },
            title: "Performance alert".to_string(),
            message: alert.message.clone(),
            case_id: None,
            created_at: now,
            read: false,
        };
        workflow.notifications.push(notification.clone());
        notification
    }

    pub fn notify_onboarding(
        &self,
        workflow: &mut WorkflowState,
        report: &StepReport,
        now: DateTime<Utc>,
    ) -> Notification {
        let message = match (&report.notes, report.onboarding_complete) {
            (_, true) => "Onboarding complete; you can now receive cases.".to_string(),
            (Some(notes), false) => format!("{}: {} ({})", report.step.label(), report.status, notes),
            (None, false) => format!("{}: {}", report.step.label(), report.status),
        };
        let notification = Notification {
            id: next_notification_id(),
            kind: NotificationKind::OnboardingUpdate,
            priority: Priority::Normal,
            title: "Onboarding update".to_string(),
            message,
            case_id: None,
            created_at: now,
            read: false,
        };
        workflow.notifications.push(notification.clone());
        notification
    }
}
