use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::IntoResponse;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::telemedicine::domain::VeterinarianId;
use crate::workflows::telemedicine::onboarding::{OnboardingStep, StepOutcome};
use crate::workflows::telemedicine::{
    telemedicine_router, EngineConfig, ServiceError, TelemedicineService,
};

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn router_with_vet() -> (axum::Router, VeterinarianId) {
    let (service, _, _) = build_service();
    let vet_id = register_active(&service, "vet-1", "cattle_medicine");
    (telemedicine_router(Arc::new(service)), vet_id)
}

#[tokio::test]
async fn register_route_creates_pending_profile() {
    let (service, _, _) = build_service();
    let router = telemedicine_router(Arc::new(service));
    let payload = serde_json::to_value(new_vet("vet-9", "poultry_health")).expect("serialize");

    let response = router
        .oneshot(json_request(Method::POST, "/api/v1/veterinarians", payload))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["id"], "vet-9");
    assert_eq!(body["status"], "pending_verification");
}

#[tokio::test]
async fn register_handler_maps_validation_to_unprocessable() {
    let (service, _, _) = build_service();
    let mut submission = new_vet("vet-9", "poultry_health");
    submission.name.clear();

    let response = crate::workflows::telemedicine::router::register_handler::<_, _>(
        State(Arc::new(service)),
        axum::Json(submission),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "name is required");
}

#[tokio::test]
async fn repository_failures_map_to_internal_error() {
    let service = Arc::new(TelemedicineService::new(
        Arc::new(UnavailableRepository),
        Arc::new(MemoryNotifier::default()),
        EngineConfig::default(),
    ));

    let response = telemedicine_router(service)
        .oneshot(empty_request(Method::GET, "/api/v1/veterinarians/vet-1"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn unknown_veterinarian_is_not_found() {
    let (router, _) = router_with_vet();

    let response = router
        .oneshot(empty_request(Method::GET, "/api/v1/veterinarians/vet-404/workflow"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "veterinarian vet-404 not found");
}

#[tokio::test]
async fn list_route_filters_by_specialty() {
    let (service, _, _) = build_service();
    register_active(&service, "vet-1", "cattle_medicine");
    register_active(&service, "vet-2", "swine_health");
    let router = telemedicine_router(Arc::new(service));

    let response = router
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/veterinarians?specialty=swine_health",
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let ids: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|profile| profile["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["vet-2"]);
}

#[tokio::test]
async fn matches_route_returns_ranked_shortlist() {
    let (router, _) = router_with_vet();
    let payload = serde_json::to_value(requirements("cattle_medicine")).expect("serialize");

    let response = router
        .oneshot(json_request(Method::POST, "/api/v1/cases/matches", payload))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body[0]["vet_id"], "vet-1");
    assert_eq!(body[0]["components"][0]["factor"], "specialty");
}

#[tokio::test]
async fn case_routes_drive_the_lifecycle() {
    let (router, vet_id) = router_with_vet();
    let payload = serde_json::to_value(case_request("case-7", "cattle_medicine")).expect("serialize");

    let assigned = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/veterinarians/{vet_id}/cases"),
            payload.clone(),
        ))
        .await
        .expect("router responds");
    assert_eq!(assigned.status(), StatusCode::CREATED);

    let duplicate = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/veterinarians/{vet_id}/cases"),
            payload,
        ))
        .await
        .expect("router responds");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let completed = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/v1/veterinarians/{vet_id}/cases/case-7/status"),
            json!({ "status": "completed" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(completed.status(), StatusCode::OK);
    let body = read_json_body(completed).await;
    assert_eq!(body["tasks_created"].as_array().map(Vec::len), Some(2));
    let task_id = body["tasks_created"][0]["id"]
        .as_str()
        .expect("task id")
        .to_string();

    let backwards = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/v1/veterinarians/{vet_id}/cases/case-7/status"),
            json!({ "status": "in_progress" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(backwards.status(), StatusCode::NOT_FOUND);

    let done = router
        .oneshot(empty_request(
            Method::POST,
            &format!("/api/v1/veterinarians/{vet_id}/tasks/{task_id}/complete"),
        ))
        .await
        .expect("router responds");
    assert_eq!(done.status(), StatusCode::OK);
    let body = read_json_body(done).await;
    assert_eq!(body["newly_completed"], true);
}

#[tokio::test]
async fn offer_route_then_mark_notification_read() {
    let (router, vet_id) = router_with_vet();
    let payload = serde_json::to_value(case_request("case-9", "cattle_medicine")).expect("serialize");

    let offered = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/veterinarians/{vet_id}/offers"),
            payload,
        ))
        .await
        .expect("router responds");
    assert_eq!(offered.status(), StatusCode::ACCEPTED);
    let body = read_json_body(offered).await;
    assert_eq!(body["kind"], "case_offer");
    assert_eq!(body["read"], false);
    let notification_id = body["id"].as_str().expect("notification id").to_string();

    let read = router
        .clone()
        .oneshot(empty_request(
            Method::POST,
            &format!("/api/v1/veterinarians/{vet_id}/notifications/{notification_id}/read"),
        ))
        .await
        .expect("router responds");
    assert_eq!(read.status(), StatusCode::OK);
    let body = read_json_body(read).await;
    assert_eq!(body["read"], true);

    let missing_alert = router
        .oneshot(empty_request(
            Method::POST,
            &format!("/api/v1/veterinarians/{vet_id}/alerts/alert-404/resolve"),
        ))
        .await
        .expect("router responds");
    assert_eq!(missing_alert.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_route_filters_by_availability() {
    let (router, _) = router_with_vet();

    let open = router
        .clone()
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/veterinarians?available_at=2025-06-02T10:00:00Z",
        ))
        .await
        .expect("router responds");
    assert_eq!(open.status(), StatusCode::OK);
    let body = read_json_body(open).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let night = router
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/veterinarians?available_at=2025-06-02T22:00:00Z",
        ))
        .await
        .expect("router responds");
    let body = read_json_body(night).await;
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn onboarding_routes_enforce_order() {
    let (service, _, _) = build_service();
    let profile = service
        .profiles()
        .register(new_vet("vet-5", "cattle_medicine"))
        .expect("register");
    let router = telemedicine_router(Arc::new(service));
    let base = format!("/api/v1/veterinarians/{}/onboarding", profile.id);

    let skipped = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/final_approval"),
            json!({ "outcome": "completed" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(skipped.status(), StatusCode::CONFLICT);

    let unknown = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/moon_landing"),
            json!({ "outcome": "completed" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let document = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/personal_info/documents"),
            json!({ "name": "government_id" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(document.status(), StatusCode::ACCEPTED);

    let failed = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/personal_info"),
            json!({ "outcome": "failed", "notes": "id expired" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(failed.status(), StatusCode::OK);
    let body = read_json_body(failed).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["notes"], "id expired");

    let retried = router
        .clone()
        .oneshot(empty_request(Method::POST, &format!("{base}/personal_info/retry")))
        .await
        .expect("router responds");
    assert_eq!(retried.status(), StatusCode::OK);

    let progress = router
        .oneshot(empty_request(Method::GET, &base))
        .await
        .expect("router responds");
    let body = read_json_body(progress).await;
    assert_eq!(body["current_step"], "personal_info");
    assert_eq!(body["step_progress"]["personal_info"]["attempts"], 2);
}

#[tokio::test]
async fn verification_route_records_provider_verdicts() {
    let (service, _, _) = build_service();
    let profile = service
        .profiles()
        .register(new_vet("vet-6", "cattle_medicine"))
        .expect("register");
    for step in [OnboardingStep::PersonalInfo, OnboardingStep::ProfessionalInfo] {
        service
            .advance_onboarding(&profile.id, step, StepOutcome::Completed { notes: None })
            .expect("advance");
    }
    let router = telemedicine_router(Arc::new(service));
    let base = format!("/api/v1/veterinarians/{}/onboarding", profile.id);

    let not_external = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/personal_info/verification"),
            json!({ "verified": true }),
        ))
        .await
        .expect("router responds");
    assert_eq!(not_external.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let rejected = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/license_verification/verification"),
            json!({ "verified": false }),
        ))
        .await
        .expect("router responds");
    assert_eq!(rejected.status(), StatusCode::OK);
    let body = read_json_body(rejected).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["current_step"], "license_verification");

    router
        .clone()
        .oneshot(empty_request(
            Method::POST,
            &format!("{base}/license_verification/retry"),
        ))
        .await
        .expect("router responds");
    let confirmed = router
        .oneshot(json_request(
            Method::POST,
            &format!("{base}/license_verification/verification"),
            json!({ "verified": true }),
        ))
        .await
        .expect("router responds");
    let body = read_json_body(confirmed).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["current_step"], "education_verification");
}

#[tokio::test]
async fn profile_edit_routes_update_preferences_and_specializations() {
    let (router, vet_id) = router_with_vet();

    let preferences = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/v1/veterinarians/{vet_id}/preferences"),
            json!({ "student_levels": ["graduate"], "educational_focus": ["biosecurity"] }),
        ))
        .await
        .expect("router responds");
    assert_eq!(preferences.status(), StatusCode::OK);
    let body = read_json_body(preferences).await;
    assert_eq!(body["preferences"]["student_levels"], json!(["graduate"]));

    let specializations = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/v1/veterinarians/{vet_id}/specializations"),
            json!([{ "topic": "poultry_health", "experience_level": "expert", "years_experience": 8 }]),
        ))
        .await
        .expect("router responds");
    assert_eq!(specializations.status(), StatusCode::OK);
    let body = read_json_body(specializations).await;
    assert_eq!(body["specializations"][0]["topic"], "poultry_health");

    let emptied = router
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/v1/veterinarians/{vet_id}/specializations"),
            json!([]),
        ))
        .await
        .expect("router responds");
    assert_eq!(emptied.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn list_route_combines_specialty_and_availability() {
    let (service, _, _) = build_service();
    register_active(&service, "vet-1", "cattle_medicine");
    register_active(&service, "vet-2", "swine_health");
    let router = telemedicine_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/veterinarians?specialty=swine_health&available_at=2025-06-02T10:00:00Z",
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let ids: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|profile| profile["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["vet-2"]);

    let night = router
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/veterinarians?specialty=swine_health&available_at=2025-06-02T22:00:00Z",
        ))
        .await
        .expect("router responds");
    let body = read_json_body(night).await;
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn rating_route_rejects_out_of_range_values() {
    let (router, vet_id) = router_with_vet();

    let response = router
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/veterinarians/{vet_id}/ratings"),
            json!({ "rating": 9.0 }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn status_route_blocks_reactivation() {
    let (router, vet_id) = router_with_vet();
    let uri = format!("/api/v1/veterinarians/{vet_id}/status");

    let deactivated = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &uri,
            json!({ "status": "deactivated" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(deactivated.status(), StatusCode::OK);

    let reactivated = router
        .oneshot(json_request(Method::PUT, &uri, json!({ "status": "active" })))
        .await
        .expect("router responds");
    assert_eq!(reactivated.status(), StatusCode::CONFLICT);
}

#[test]
fn verification_failures_map_to_bad_gateway() {
    let err = ServiceError::from(
        crate::workflows::telemedicine::VerificationError::TimedOut(30),
    );
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
}
