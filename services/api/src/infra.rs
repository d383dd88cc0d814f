use agvet::workflows::telemedicine::{
    InMemoryVeterinarianRepository, Notification, NotificationError, NotificationSender,
    TelemedicineService, VeterinarianId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type ApiService =
    TelemedicineService<InMemoryVeterinarianRepository, TracingNotificationSender>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Delivers notifications to the log stream until a push/e-mail transport is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNotificationSender;

impl NotificationSender for TracingNotificationSender {
    fn send(
        &self,
        vet_id: &VeterinarianId,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        info!(
            vet_id = %vet_id,
            notification_id = %notification.id,
            kind = ?notification.kind,
            priority = ?notification.priority,
            title = %notification.title,
            "notification dispatched"
        );
        Ok(())
    }
}
