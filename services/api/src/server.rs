use crate::cli::ServeArgs;
use crate::infra::{ApiService, AppState, TracingNotificationSender};
use crate::routes::with_operational_routes;
use agvet::config::AppConfig;
use agvet::error::AppError;
use agvet::telemetry;
use agvet::workflows::telemedicine::InMemoryVeterinarianRepository;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryVeterinarianRepository::default());
    let notifier = Arc::new(TracingNotificationSender);
    let service = Arc::new(ApiService::new(repository, notifier, config.engine.clone()));

    let app = with_operational_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        shortlist_size = config.engine.matching.shortlist_size,
        "telemedicine service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
