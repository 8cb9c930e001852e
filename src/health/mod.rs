//! Health and readiness aggregation.
//!
//! Each core component self-reports; the collector folds the reports into
//! an overall status. Liveness is process-level, readiness requires the
//! default model artifact, and the detailed surface carries per-component
//! reports with counters.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use crate::admission::AdmissionController;
use crate::compliance::ComplianceJournal;
use crate::model::ModelHost;
use crate::scheduler::BatchScheduler;
use crate::service::ServiceCounters;

/// Health state of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ComponentStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl ComponentStatus {
    fn severity(&self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Degraded(_) => 1,
            Self::Unhealthy(_) => 2,
        }
    }
}

/// One component's self-report.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentReport {
    pub name: &'static str,
    pub status: ComponentStatus,
    /// Whether the component is critical: an unhealthy critical component
    /// makes the whole service unhealthy.
    pub critical: bool,
    pub detail: serde_json::Value,
}

/// Overall service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Detailed health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: OverallStatus,
    pub timestamp: chrono::DateTime<Utc>,
    pub uptime_seconds: u64,
    pub version: &'static str,
    pub components: Vec<ComponentReport>,
}

/// Builds health snapshots from live component handles.
pub struct HealthCollector {
    model_host: Arc<ModelHost>,
    service_counters: Arc<ServiceCounters>,
    scheduler: Arc<BatchScheduler>,
    journal: ComplianceJournal,
    admission: Arc<AdmissionController>,
    validation_summary: serde_json::Value,
    started: Instant,
}

impl HealthCollector {
    pub fn new(
        model_host: Arc<ModelHost>,
        service_counters: Arc<ServiceCounters>,
        scheduler: Arc<BatchScheduler>,
        journal: ComplianceJournal,
        admission: Arc<AdmissionController>,
        validation_summary: serde_json::Value,
    ) -> Self {
        Self {
            model_host,
            service_counters,
            scheduler,
            journal,
            admission,
            validation_summary,
            started: Instant::now(),
        }
    }

    /// The process can serve requests at all.
    pub fn alive(&self) -> bool {
        true
    }

    /// Ready to score: the default artifact is loaded.
    pub fn ready(&self) -> bool {
        self.model_host.health().default_loaded
    }

    /// Detailed per-component report.
    pub fn detailed(&self) -> HealthSnapshot {
        let components = vec![
            self.model_report(),
            self.scoring_report(),
            self.scheduler_report(),
            self.journal_report(),
            self.admission_report(),
        ];

        let status = components
            .iter()
            .map(|report| match (&report.status, report.critical) {
                (ComponentStatus::Unhealthy(_), true) => OverallStatus::Unhealthy,
                (status, _) if status.severity() > 0 => OverallStatus::Degraded,
                _ => OverallStatus::Healthy,
            })
            .max_by_key(|status| match status {
                OverallStatus::Healthy => 0,
                OverallStatus::Degraded => 1,
                OverallStatus::Unhealthy => 2,
            })
            .unwrap_or(OverallStatus::Healthy);

        HealthSnapshot {
            status,
            timestamp: Utc::now(),
            uptime_seconds: self.started.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION"),
            components,
        }
    }

    fn model_report(&self) -> ComponentReport {
        let health = self.model_host.health();
        let status = if health.default_loaded {
            ComponentStatus::Healthy
        } else {
            ComponentStatus::Unhealthy("default model artifact not loaded".into())
        };
        ComponentReport {
            name: "model_host",
            status,
            critical: true,
            detail: serde_json::json!({
                "loaded_models": health.loaded_models,
                "capacity": health.capacity,
            }),
        }
    }

    fn scoring_report(&self) -> ComponentReport {
        let total = self.service_counters.total_predictions.load(Ordering::Relaxed);
        let failed = self.service_counters.failed_predictions.load(Ordering::Relaxed);
        ComponentReport {
            name: "scoring_service",
            status: ComponentStatus::Healthy,
            critical: true,
            detail: serde_json::json!({
                "total_predictions": total,
                "failed_predictions": failed,
                "validation": self.validation_summary,
            }),
        }
    }

    fn scheduler_report(&self) -> ComponentReport {
        let counts = self.scheduler.counts();
        ComponentReport {
            name: "batch_scheduler",
            status: ComponentStatus::Healthy,
            critical: false,
            detail: serde_json::json!({
                "active_jobs": counts.active,
                "queued_jobs": counts.queued,
                "completed_jobs": counts.completed,
            }),
        }
    }

    fn journal_report(&self) -> ComponentReport {
        let health = self.journal.health();
        let status = if health.enabled && !health.writable {
            ComponentStatus::Degraded("journal writes are failing".into())
        } else if health.records_dropped > 0 {
            ComponentStatus::Degraded(format!(
                "{} journal records dropped under back-pressure",
                health.records_dropped
            ))
        } else {
            ComponentStatus::Healthy
        };
        ComponentReport {
            name: "compliance_journal",
            status,
            critical: false,
            detail: serde_json::json!({
                "enabled": health.enabled,
                "writable": health.writable,
                "records_written": health.records_written,
                "records_dropped": health.records_dropped,
            }),
        }
    }

    fn admission_report(&self) -> ComponentReport {
        ComponentReport {
            name: "admission",
            status: ComponentStatus::Healthy,
            critical: false,
            detail: serde_json::json!({
                "credentials_loaded": self.admission.credential_count(),
                "shared_rate_limit_store": self.admission.uses_shared_store(),
            }),
        }
    }
}
