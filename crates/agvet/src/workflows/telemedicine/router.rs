use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    AlertId, Availability, CaseId, CaseRequest, CaseRequirements, CaseStatus, NewTask,
    NewVeterinarian, NotificationId, Preferences, Specialization, TaskId, VeterinarianId,
    VeterinarianStatus,
};
use super::onboarding::{OnboardingStep, StepOutcome};
use super::repository::{NotificationSender, RepositoryError, VeterinarianRepository};
use super::service::{ServiceError, TelemedicineService};

type SharedService<R, N> = Arc<TelemedicineService<R, N>>;

/// Router builder exposing profile, onboarding, matching and workflow endpoints.
pub fn telemedicine_router<R, N>(service: SharedService<R, N>) -> Router
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    Router::new()
        .route(
            "/api/v1/veterinarians",
            post(register_handler::<R, N>).get(list_handler::<R, N>),
        )
        .route("/api/v1/veterinarians/:vet_id", get(profile_handler::<R, N>))
        .route(
            "/api/v1/veterinarians/:vet_id/status",
            put(status_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/availability",
            put(availability_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/preferences",
            put(preferences_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/specializations",
            put(specializations_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/onboarding",
            get(onboarding_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/onboarding/:step",
            post(advance_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/onboarding/:step/documents",
            post(document_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/onboarding/:step/retry",
            post(retry_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/onboarding/:step/verification",
            post(verification_handler::<R, N>),
        )
        .route("/api/v1/cases/matches", post(matches_handler::<R, N>))
        .route(
            "/api/v1/veterinarians/:vet_id/workflow",
            get(workflow_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/cases",
            post(assign_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/offers",
            post(offer_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/cases/:case_id/status",
            put(case_status_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/tasks",
            post(add_task_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/tasks/:task_id/complete",
            post(complete_task_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/ratings",
            post(rating_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/notifications/:notification_id/read",
            post(notification_read_handler::<R, N>),
        )
        .route(
            "/api/v1/veterinarians/:vet_id/alerts/:alert_id/resolve",
            post(resolve_alert_handler::<R, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileQuery {
    specialty: Option<String>,
    available_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    status: VeterinarianStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerificationRequest {
    verified: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CaseStatusRequest {
    status: CaseStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RatingRequest {
    rating: f64,
}

type HandlerResult = Result<Response, ServiceError>;

fn parse_step(key: &str) -> Result<OnboardingStep, ServiceError> {
    OnboardingStep::from_key(key).ok_or_else(|| ServiceError::not_found("onboarding step", key))
}

pub(crate) async fn register_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Json(submission): Json<NewVeterinarian>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let profile = service.profiles().register(submission)?;
    Ok((StatusCode::CREATED, Json(profile)).into_response())
}

pub(crate) async fn list_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Query(query): Query<ProfileQuery>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let profiles = match (query.specialty, query.available_at) {
        (Some(topic), Some(at)) => {
            let available: HashSet<VeterinarianId> = service
                .profiles()
                .find_available(at)?
                .into_iter()
                .map(|profile| profile.id)
                .collect();
            service
                .profiles()
                .find_by_specialty(&topic)?
                .into_iter()
                .filter(|profile| available.contains(&profile.id))
                .collect::<Vec<_>>()
        }
        (Some(topic), None) => service.profiles().find_by_specialty(&topic)?,
        (None, Some(at)) => service.profiles().find_available(at)?,
        (None, None) => service.profiles().list()?,
    };
    Ok(Json(profiles).into_response())
}

pub(crate) async fn profile_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let profile = service.profiles().get(&VeterinarianId(vet_id))?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn status_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let profile = service
        .profiles()
        .set_status(&VeterinarianId(vet_id), request.status)?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn availability_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
    Json(availability): Json<Availability>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let profile = service
        .profiles()
        .update_availability(&VeterinarianId(vet_id), availability)?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn preferences_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
    Json(preferences): Json<Preferences>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let profile = service
        .profiles()
        .update_preferences(&VeterinarianId(vet_id), preferences)?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn specializations_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
    Json(specializations): Json<Vec<Specialization>>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let profile = service
        .profiles()
        .update_specializations(&VeterinarianId(vet_id), specializations)?;
    Ok(Json(profile).into_response())
}

pub(crate) async fn onboarding_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let progress = service.onboarding(&VeterinarianId(vet_id))?;
    Ok(Json(progress).into_response())
}

pub(crate) async fn advance_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((vet_id, step)): Path<(String, String)>,
    Json(outcome): Json<StepOutcome>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let step = parse_step(&step)?;
    let report = service.advance_onboarding(&VeterinarianId(vet_id), step, outcome)?;
    Ok(Json(report).into_response())
}

pub(crate) async fn document_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((vet_id, step)): Path<(String, String)>,
    Json(request): Json<DocumentRequest>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let step = parse_step(&step)?;
    let progress =
        service.submit_onboarding_document(&VeterinarianId(vet_id), step, &request.name)?;
    Ok((StatusCode::ACCEPTED, Json(progress)).into_response())
}

pub(crate) async fn retry_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((vet_id, step)): Path<(String, String)>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let step = parse_step(&step)?;
    let report = service.retry_onboarding_step(&VeterinarianId(vet_id), step)?;
    Ok(Json(report).into_response())
}

pub(crate) async fn verification_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((vet_id, step)): Path<(String, String)>,
    Json(request): Json<VerificationRequest>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let step = parse_step(&step)?;
    let report = service.record_verification(&VeterinarianId(vet_id), step, request.verified)?;
    Ok(Json(report).into_response())
}

pub(crate) async fn matches_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Json(requirements): Json<CaseRequirements>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let shortlist = service.find_matches(&requirements)?;
    Ok(Json(shortlist).into_response())
}

pub(crate) async fn workflow_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let workflow = service.workflow(&VeterinarianId(vet_id))?;
    Ok(Json(workflow).into_response())
}

pub(crate) async fn assign_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
    Json(request): Json<CaseRequest>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let case = service.assign(&VeterinarianId(vet_id), request)?;
    Ok((StatusCode::CREATED, Json(case)).into_response())
}

pub(crate) async fn offer_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
    Json(request): Json<CaseRequest>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let notification = service.offer_case(&VeterinarianId(vet_id), request)?;
    Ok((StatusCode::ACCEPTED, Json(notification)).into_response())
}

pub(crate) async fn case_status_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((vet_id, case_id)): Path<(String, String)>,
    Json(request): Json<CaseStatusRequest>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let update = service.update_case_status(
        &VeterinarianId(vet_id),
        &CaseId(case_id),
        request.status,
    )?;
    Ok(Json(update).into_response())
}

pub(crate) async fn add_task_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
    Json(task): Json<NewTask>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let task = service.add_task(&VeterinarianId(vet_id), task)?;
    Ok((StatusCode::CREATED, Json(task)).into_response())
}

pub(crate) async fn complete_task_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((vet_id, task_id)): Path<(String, String)>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let completion = service.complete_task(&VeterinarianId(vet_id), &TaskId(task_id))?;
    Ok(Json(completion).into_response())
}

pub(crate) async fn rating_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(vet_id): Path<String>,
    Json(request): Json<RatingRequest>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let update = service.record_rating(&VeterinarianId(vet_id), request.rating)?;
    Ok(Json(update).into_response())
}

pub(crate) async fn notification_read_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((vet_id, notification_id)): Path<(String, String)>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let notification = service.mark_notification_read(
        &VeterinarianId(vet_id),
        &NotificationId(notification_id),
    )?;
    Ok(Json(notification).into_response())
}

pub(crate) async fn resolve_alert_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path((vet_id, alert_id)): Path<(String, String)>,
) -> HandlerResult
where
    R: VeterinarianRepository + 'static,
    N: NotificationSender + 'static,
{
    let alert = service.resolve_alert(&VeterinarianId(vet_id), &AlertId(alert_id))?;
    Ok(Json(alert).into_response())
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } | Self::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AlreadyRegistered(_)
            | Self::InvalidTransition(_)
            | Self::CaseAlreadyAssigned { .. }
            | Self::Repository(RepositoryError::Conflict)
            | Self::Repository(RepositoryError::CaseClaimed { .. })
            | Self::Repository(RepositoryError::StaleVersion { .. }) => StatusCode::CONFLICT,
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Verification(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let payload = json!({
            "error": self.to_string(),
        });
        (status, Json(payload)).into_response()
    }
}
