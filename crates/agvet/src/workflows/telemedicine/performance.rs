use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    AlertId, AlertKind, AlertSeverity, PerformanceAlert, PerformanceMetrics, WorkflowState,
};

/// Alert trip points applied after every metric update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    /// Response-time alert fires above `commitment * multiplier`.
    pub response_time_multiplier: f64,
    pub minimum_satisfaction: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            response_time_multiplier: 1.5,
            minimum_satisfaction: 4.0,
        }
    }
}

static ALERT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_alert_id() -> AlertId {
    let id = ALERT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AlertId(format!("alert-{id:06}"))
}

/// Fold `value` into a mean over `count` samples, `count` already including `value`.
pub fn running_mean(previous_mean: f64, count: u32, value: f64) -> f64 {
    if count <= 1 {
        return value;
    }
    let n = count as f64;
    (previous_mean * (n - 1.0) + value) / n
}

struct Breach {
    severity: AlertSeverity,
    observed: f64,
    threshold: f64,
    message: String,
}

/// Maintains rolling metrics and keeps at most one open alert per alert kind.
#[derive(Debug, Clone, Default)]
pub struct PerformanceMonitor {
    thresholds: PerformanceThresholds,
}

impl PerformanceMonitor {
    pub fn new(thresholds: PerformanceThresholds) -> Self {
        Self { thresholds }
    }

    pub fn record_consultation(&self, metrics: &mut PerformanceMetrics, response_minutes: f64) {
        metrics.completed_consultations += 1;
        metrics.average_response_time_minutes = running_mean(
            metrics.average_response_time_minutes,
            metrics.completed_consultations,
            response_minutes,
        );
    }

    pub fn record_rating(&self, metrics: &mut PerformanceMetrics, rating: f64) {
        let satisfaction = &mut metrics.client_satisfaction;
        satisfaction.total_ratings += 1;
        satisfaction.overall_rating = running_mean(
            satisfaction.overall_rating,
            satisfaction.total_ratings,
            rating,
        );
    }

    /// Reconcile open alerts with `metrics`, returning the alerts raised by this call.
    pub fn evaluate(
        &self,
        metrics: &PerformanceMetrics,
        workflow: &mut WorkflowState,
        now: DateTime<Utc>,
    ) -> Vec<PerformanceAlert> {
        let checks = [
            (AlertKind::ResponseTime, self.response_time_breach(metrics)),
            (AlertKind::Satisfaction, self.satisfaction_breach(metrics)),
        ];

        let mut raised = Vec::new();
        for (kind, breach) in checks {
            let has_open = workflow.open_alert(kind).is_some();
            match (breach, has_open) {
                (Some(breach), false) => {
                    let alert = PerformanceAlert {
                        id: next_alert_id(),
                        kind,
                        severity: breach.severity,
                        message: breach.message,
                        observed: breach.observed,
                        threshold: breach.threshold,
                        raised_at: now,
                        resolved_at: None,
                    };
                    workflow.alerts.push(alert.clone());
                    raised.push(alert);
                }
                (None, true) => {
                    for alert in workflow
                        .alerts
                        .iter_mut()
                        .filter(|alert| alert.kind == kind && alert.is_open())
                    {
                        alert.resolved_at = Some(now);
                    }
                }
                _ => {}
            }
        }
        raised
    }

    fn response_time_breach(&self, metrics: &PerformanceMetrics) -> Option<Breach> {
        if metrics.completed_consultations == 0 || metrics.response_time_commitment_minutes <= 0.0
        {
            return None;
        }

        let threshold =
            metrics.response_time_commitment_minutes * self.thresholds.response_time_multiplier;
        let observed = metrics.average_response_time_minutes;
        (observed > threshold).then(|| Breach {
            severity: AlertSeverity::Warning,
            observed,
            threshold,
            message: format!(
                "average response time {observed:.1} min exceeds {threshold:.1} min"
            ),
        })
    }

    fn satisfaction_breach(&self, metrics: &PerformanceMetrics) -> Option<Breach> {
        let satisfaction = metrics.client_satisfaction;
        if satisfaction.total_ratings == 0 {
            return None;
        }

        let threshold = self.thresholds.minimum_satisfaction;
        let observed = satisfaction.overall_rating;
        (observed < threshold).then(|| Breach {
            severity: AlertSeverity::Critical,
            observed,
            threshold,
            message: format!("overall rating {observed:.2} fell below {threshold:.1}"),
        })
    }
}

/// Manually close an alert. Resolving an already resolved alert is a no-op.
pub fn resolve_alert(
    workflow: &mut WorkflowState,
    alert_id: &AlertId,
    now: DateTime<Utc>,
) -> Option<PerformanceAlert> {
    let alert = workflow
        .alerts
        .iter_mut()
        .find(|alert| &alert.id == alert_id)?;
    if alert.resolved_at.is_none() {
        alert.resolved_at = Some(now);
    }
    Some(alert.clone())
}
