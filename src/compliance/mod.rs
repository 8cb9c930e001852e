//! OSHA compliance journal.
//!
//! Append-only log of every scoring event: assessments, high-risk alerts,
//! batch summaries, and batch alerts. Records are newline-delimited with an
//! ISO-8601 timestamp prefix and a JSON payload, written by a single writer
//! task fed through a bounded channel — scoring paths never block on disk.
//! A full channel drops the record and counts the drop; journal health
//! surfaces both totals. The file rotates at a byte limit with a bounded
//! number of generations retained.

pub mod query;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::model_config::{risk_thresholds, HeatIndexBand};
use crate::types::{BatchItem, PredictionResult};

/// Buffered channel depth between scoring paths and the writer task.
const CHANNEL_DEPTH: usize = 1024;

/// Journal record kinds, tagged in each payload.
mod event {
    pub const ASSESSMENT: &str = "HEAT_EXPOSURE_ASSESSMENT";
    pub const HIGH_RISK_ALERT: &str = "IMMEDIATE_ACTION_REQUIRED";
    pub const BATCH_SUMMARY: &str = "BATCH_ASSESSMENT_SUMMARY";
    pub const BATCH_ALERT: &str = "BATCH_HIGH_RISK_ALERT";
}

/// One journal line queued for the writer.
#[derive(Debug)]
struct JournalEntry {
    timestamp: chrono::DateTime<Utc>,
    payload: serde_json::Value,
}

/// Counters shared between the handle and the writer task.
#[derive(Debug, Default)]
struct JournalStats {
    written: AtomicU64,
    dropped: AtomicU64,
    write_failed: AtomicBool,
}

/// Journal health, surfaced by the detailed health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JournalHealth {
    pub enabled: bool,
    pub writable: bool,
    pub records_written: u64,
    pub records_dropped: u64,
}

/// Journal configuration.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub max_bytes: u64,
    pub generations: usize,
    /// Heat index (°F) at or above which an assessment escalates.
    pub heat_index_danger_f: f64,
    /// Fraction of high-risk items above which a batch alert is emitted.
    /// Zero means any high-risk worker triggers the alert.
    pub alert_fraction_threshold: f64,
}

impl JournalConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
            max_bytes: u64::MAX,
            generations: 0,
            heat_index_danger_f: 90.0,
            alert_fraction_threshold: 0.0,
        }
    }
}

/// Handle used by the scoring service to enqueue records.
#[derive(Clone)]
pub struct ComplianceJournal {
    sender: Option<mpsc::Sender<JournalEntry>>,
    stats: Arc<JournalStats>,
    config: Arc<JournalConfig>,
}

impl ComplianceJournal {
    /// Spawn the writer task and return the shared handle. A disabled
    /// journal spawns nothing and drops records silently.
    pub fn spawn(
        config: JournalConfig,
        shutdown: CancellationToken,
    ) -> (Self, Option<tokio::task::JoinHandle<()>>) {
        let stats = Arc::new(JournalStats::default());
        if !config.enabled {
            return (
                Self { sender: None, stats, config: Arc::new(config) },
                None,
            );
        }

        let (sender, receiver) = mpsc::channel(CHANNEL_DEPTH);
        let writer = JournalWriter {
            path: config.path.clone(),
            max_bytes: config.max_bytes,
            generations: config.generations,
            stats: Arc::clone(&stats),
        };
        let handle = tokio::spawn(writer.run(receiver, shutdown));
        info!(path = %config.path.display(), "Compliance journal enabled");
        (
            Self { sender: Some(sender), stats, config: Arc::new(config) },
            Some(handle),
        )
    }

    /// Journal one assessment; escalates to a high-risk alert when the
    /// score or heat index crosses the danger thresholds.
    pub fn log_assessment(&self, result: &PredictionResult) {
        if self.sender.is_none() {
            return;
        }

        self.enqueue(assessment_payload(result, self.config.heat_index_danger_f));

        let escalate = result.risk_score > risk_thresholds::WARNING
            || result.heat_index_f >= self.config.heat_index_danger_f
            || result.requires_immediate_attention;
        if escalate {
            self.enqueue(high_risk_payload(result, self.config.heat_index_danger_f));
        }
    }

    /// Journal a batch: one summary, per-item assessments, and a batch
    /// alert when the high-risk fraction exceeds the configured threshold.
    pub fn log_batch(&self, request_id: &str, items: &[BatchItem]) {
        if self.sender.is_none() || items.is_empty() {
            return;
        }

        self.enqueue(batch_summary_payload(request_id, items, self.config.heat_index_danger_f));

        for item in items {
            if let Some(result) = item.as_ok() {
                self.log_assessment(result);
            }
        }

        let successful: Vec<&PredictionResult> =
            items.iter().filter_map(BatchItem::as_ok).collect();
        let high_risk = successful
            .iter()
            .filter(|r| r.risk_score > risk_thresholds::WARNING)
            .count();
        if !successful.is_empty() {
            let fraction = high_risk as f64 / successful.len() as f64;
            if high_risk > 0 && fraction > self.config.alert_fraction_threshold {
                self.enqueue(batch_alert_payload(request_id, items.len(), high_risk, fraction));
            }
        }
    }

    /// Current journal health.
    pub fn health(&self) -> JournalHealth {
        JournalHealth {
            enabled: self.sender.is_some(),
            writable: !self.stats.write_failed.load(Ordering::Relaxed),
            records_written: self.stats.written.load(Ordering::Relaxed),
            records_dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }

    fn enqueue(&self, payload: serde_json::Value) {
        let Some(sender) = &self.sender else { return };
        let entry = JournalEntry { timestamp: Utc::now(), payload };
        if let Err(err) = sender.try_send(entry) {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(error = %err, "Compliance journal channel full, record dropped");
        }
    }
}

/// The single writer behind the channel.
struct JournalWriter {
    path: PathBuf,
    max_bytes: u64,
    generations: usize,
    stats: Arc<JournalStats>,
}

impl JournalWriter {
    async fn run(self, mut receiver: mpsc::Receiver<JournalEntry>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                entry = receiver.recv() => match entry {
                    Some(entry) => self.write_entry(&entry),
                    None => break,
                },
                () = shutdown.cancelled() => {
                    // Drain whatever is already queued, then stop.
                    while let Ok(entry) = receiver.try_recv() {
                        self.write_entry(&entry);
                    }
                    break;
                }
            }
        }
        debug!("Compliance journal writer stopped");
    }

    fn write_entry(&self, entry: &JournalEntry) {
        let line = format!(
            "{} {}\n",
            entry.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            entry.payload
        );

        if let Err(err) = self.append_line(&line) {
            self.stats.write_failed.store(true, Ordering::Relaxed);
            error!(error = %err, path = %self.path.display(), "Compliance journal write failed");
            return;
        }
        self.stats.write_failed.store(false, Ordering::Relaxed);
        self.stats.written.fetch_add(1, Ordering::Relaxed);
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let current_size = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if current_size > 0 && current_size + line.len() as u64 > self.max_bytes {
            self.rotate()?;
        }

        let mut file =
            std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    /// Shift `file.N → file.N+1`, dropping the oldest generation, then move
    /// the live file to `file.1`.
    fn rotate(&self) -> std::io::Result<()> {
        if self.generations == 0 {
            std::fs::remove_file(&self.path)?;
            return Ok(());
        }
        let generation_path = |n: usize| -> PathBuf {
            PathBuf::from(format!("{}.{n}", self.path.display()))
        };
        let oldest = generation_path(self.generations);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        for n in (1..self.generations).rev() {
            let from = generation_path(n);
            if from.exists() {
                std::fs::rename(&from, generation_path(n + 1))?;
            }
        }
        std::fs::rename(&self.path, generation_path(1))?;
        debug!(path = %self.path.display(), "Rotated compliance journal");
        Ok(())
    }
}

/// Rotated generation paths for a journal file, newest first.
pub fn generation_paths(path: &Path, generations: usize) -> Vec<PathBuf> {
    let mut paths = vec![path.to_path_buf()];
    for n in 1..=generations {
        paths.push(PathBuf::from(format!("{}.{n}", path.display())));
    }
    paths
}

fn assessment_payload(result: &PredictionResult, danger_f: f64) -> serde_json::Value {
    json!({
        "compliance_event": event::ASSESSMENT,
        "timestamp_utc": result.timestamp.to_rfc3339(),
        "worker_identification": {
            "worker_id": result.worker_id,
            "batch_index": result.batch_index,
        },
        "environmental_conditions": {
            "temperature_celsius": result.temperature_c,
            "temperature_fahrenheit": result.temperature_f,
            "humidity_percent": result.humidity_pct,
            "heat_index_fahrenheit": result.heat_index_f,
        },
        "risk_assessment": {
            "risk_score": result.risk_score,
            "risk_level": result.risk_level,
            "requires_immediate_attention": result.requires_immediate_attention,
            "confidence": result.confidence,
        },
        "physiological_indicators": {
            "heart_rate_avg": result.heart_rate_avg,
            "hrv_rmssd": result.hrv_rmssd,
        },
        "safety_recommendations": {
            "recommendations": result.osha_recommendations,
            "recommendation_count": result.osha_recommendations.len(),
        },
        "compliance_flags": {
            "heat_index_band": HeatIndexBand::classify(result.heat_index_f).tag(),
            "exceeds_heat_index_threshold": result.heat_index_f >= danger_f,
            "requires_work_rest_cycle": result.risk_score > risk_thresholds::CAUTION,
            "medical_attention_recommended": result.risk_score > risk_thresholds::WARNING,
        },
        "system_metadata": {
            "request_id": result.request_id,
            "conservative_bias_applied": result.conservative_bias_applied,
        },
    })
}

fn high_risk_payload(result: &PredictionResult, danger_f: f64) -> serde_json::Value {
    let mut reasons = Vec::new();
    if result.risk_score > risk_thresholds::WARNING {
        reasons.push(format!("High heat exposure risk score: {:.3}", result.risk_score));
    }
    if result.heat_index_f >= danger_f {
        reasons.push(format!("Heat index {:.1}°F at or above danger threshold", result.heat_index_f));
    }
    if result.requires_immediate_attention {
        reasons.push("Assessment flagged for immediate attention".to_string());
    }

    json!({
        "compliance_event": event::HIGH_RISK_ALERT,
        "timestamp_utc": Utc::now().to_rfc3339(),
        "worker_id": result.worker_id,
        "risk_score": result.risk_score,
        "risk_level": result.risk_level,
        "heat_index": result.heat_index_f,
        "alert_reasons": reasons,
        "immediate_recommendations": result.osha_recommendations.iter().take(3).collect::<Vec<_>>(),
    })
}

fn batch_summary_payload(
    request_id: &str,
    items: &[BatchItem],
    danger_f: f64,
) -> serde_json::Value {
    let successful: Vec<&PredictionResult> = items.iter().filter_map(BatchItem::as_ok).collect();
    if successful.is_empty() {
        return json!({
            "compliance_event": event::BATCH_SUMMARY,
            "timestamp_utc": Utc::now().to_rfc3339(),
            "request_id": request_id,
            "error": "No successful predictions in batch",
            "total_workers": items.len(),
        });
    }

    let scores: Vec<f64> = successful.iter().map(|r| r.risk_score).collect();
    let heat_indices: Vec<f64> = successful.iter().map(|r| r.heat_index_f).collect();
    let mut band_distribution = std::collections::HashMap::new();
    let mut level_distribution = std::collections::HashMap::new();
    for r in &successful {
        *band_distribution
            .entry(HeatIndexBand::classify(r.heat_index_f).tag())
            .or_insert(0usize) += 1;
        *level_distribution.entry(r.risk_level.to_string()).or_insert(0usize) += 1;
    }
    let attention = successful.iter().filter(|r| r.requires_immediate_attention).count();
    let above_danger = heat_indices.iter().filter(|&&hi| hi >= danger_f).count();
    let sum: f64 = scores.iter().sum();
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    json!({
        "compliance_event": event::BATCH_SUMMARY,
        "timestamp_utc": Utc::now().to_rfc3339(),
        "request_id": request_id,
        "batch_info": {
            "total_workers_assessed": items.len(),
            "successful_assessments": successful.len(),
            "failed_assessments": items.len() - successful.len(),
        },
        "risk_summary": {
            "average_risk_score": sum / successful.len() as f64,
            "highest_risk_score": max,
            "risk_level_distribution": level_distribution,
        },
        "environmental_summary": {
            "heat_index_band_distribution": band_distribution,
            "workers_above_heat_threshold": above_danger,
        },
        "compliance_alerts": {
            "workers_requiring_immediate_attention": attention,
            "fraction_requiring_attention": attention as f64 / successful.len() as f64,
        },
    })
}

fn batch_alert_payload(
    request_id: &str,
    total: usize,
    high_risk: usize,
    fraction: f64,
) -> serde_json::Value {
    json!({
        "compliance_event": event::BATCH_ALERT,
        "timestamp_utc": Utc::now().to_rfc3339(),
        "request_id": request_id,
        "total_workers": total,
        "high_risk_workers": high_risk,
        "risk_percentage": fraction * 100.0,
        "recommended_actions": [
            "Immediately review high-risk worker conditions",
            "Implement emergency cooling procedures",
            "Consider work stoppage if conditions do not improve",
            "Contact medical personnel if heat illness symptoms present",
        ],
    })
}
