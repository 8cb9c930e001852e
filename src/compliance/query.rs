//! Read side of the compliance journal: record queries and report building.
//!
//! Readers open the journal files independently of the writer. Unreadable
//! files or unparseable lines degrade to an empty result with a marker
//! rather than failing the query.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::generation_paths;

/// One parsed journal record.
#[derive(Debug, Clone)]
pub struct JournalRecord {
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl JournalRecord {
    pub fn event(&self) -> Option<&str> {
        self.payload.get("compliance_event").and_then(|v| v.as_str())
    }

    pub fn worker_id(&self) -> Option<&str> {
        self.payload
            .get("worker_identification")
            .and_then(|w| w.get("worker_id"))
            .or_else(|| self.payload.get("worker_id"))
            .and_then(|v| v.as_str())
    }
}

/// Filter for journal queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub worker_ids: Option<HashSet<String>>,
}

impl QueryFilter {
    fn matches(&self, record: &JournalRecord) -> bool {
        if let Some(from) = self.from {
            if record.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.timestamp > to {
                return false;
            }
        }
        if let Some(ids) = &self.worker_ids {
            match record.worker_id() {
                Some(id) if ids.contains(id) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Aggregate report over matching journal records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplianceReport {
    pub total_records: usize,
    pub assessments: usize,
    pub high_risk_alerts: usize,
    pub batch_summaries: usize,
    pub batch_alerts: usize,
    pub risk_level_distribution: HashMap<String, usize>,
    /// High-risk alerts per assessment; 0 when there are no assessments.
    pub incident_rate: f64,
    /// Set when the journal was missing or partially unreadable.
    pub degraded: bool,
}

/// Read matching records across the live journal and rotated generations.
/// Missing files mark the result degraded instead of failing.
pub fn read_records(
    path: &Path,
    generations: usize,
    filter: &QueryFilter,
) -> (Vec<JournalRecord>, bool) {
    let mut records = Vec::new();
    let mut degraded = false;
    let mut any_file = false;

    // Oldest generation first so records come back in append order.
    for file in generation_paths(path, generations).iter().rev() {
        let content = match std::fs::read_to_string(file) {
            Ok(content) => {
                any_file = true;
                content
            }
            Err(_) => continue,
        };
        for line in content.lines() {
            match parse_line(line) {
                Some(record) => {
                    if filter.matches(&record) {
                        records.push(record);
                    }
                }
                None => degraded = true,
            }
        }
    }

    if !any_file {
        degraded = true;
    }
    (records, degraded)
}

/// Build an aggregate report for the matching records.
pub fn generate_report(path: &Path, generations: usize, filter: &QueryFilter) -> ComplianceReport {
    let (records, degraded) = read_records(path, generations, filter);
    let mut report = ComplianceReport { degraded, ..ComplianceReport::default() };
    report.total_records = records.len();

    for record in &records {
        match record.event() {
            Some("HEAT_EXPOSURE_ASSESSMENT") => {
                report.assessments += 1;
                if let Some(level) = record
                    .payload
                    .get("risk_assessment")
                    .and_then(|r| r.get("risk_level"))
                    .and_then(|v| v.as_str())
                {
                    *report.risk_level_distribution.entry(level.to_string()).or_insert(0) += 1;
                }
            }
            Some("IMMEDIATE_ACTION_REQUIRED") => report.high_risk_alerts += 1,
            Some("BATCH_ASSESSMENT_SUMMARY") => report.batch_summaries += 1,
            Some("BATCH_HIGH_RISK_ALERT") => report.batch_alerts += 1,
            _ => {}
        }
    }

    if report.assessments > 0 {
        report.incident_rate = report.high_risk_alerts as f64 / report.assessments as f64;
    }
    report
}

fn parse_line(line: &str) -> Option<JournalRecord> {
    let (timestamp, payload) = line.split_once(' ')?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp).ok()?.with_timezone(&Utc);
    let payload = serde_json::from_str(payload).ok()?;
    Some(JournalRecord { timestamp, payload })
}
