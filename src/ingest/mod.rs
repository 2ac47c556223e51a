//! In-memory metric storage and aggregation.
//!
//! # Responsibilities
//! - Hold raw ingested metric records for the process lifetime
//! - Aggregate per-kind summaries over a time period
//!
//! # Design Decisions
//! - Plain RwLock'd vector: ingestion is append-only and summaries read a
//!   snapshot; critical sections stay short
//! - No durability; records live and die with the process

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// A single ingested metric observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    /// ISO 8601 timestamp, normalized to UTC on parse.
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Time period filter for summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    All,
    Daily,
    Hourly,
}

impl Period {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "all" => Some(Period::All),
            "daily" => Some(Period::Daily),
            "hourly" => Some(Period::Hourly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::All => "all",
            Period::Daily => "daily",
            Period::Hourly => "hourly",
        }
    }

    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::All => None,
            Period::Daily => Some(now - Duration::days(1)),
            Period::Hourly => Some(now - Duration::hours(1)),
        }
    }
}

/// Aggregated view over one metric kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    #[serde(rename = "type")]
    pub kind: String,
    pub period: String,
    pub count: usize,
    pub average_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub latest_value: f64,
}

impl MetricSummary {
    fn empty(kind: &str, period: Period) -> Self {
        Self {
            kind: kind.to_string(),
            period: period.as_str().to_string(),
            count: 0,
            average_value: 0.0,
            min_value: 0.0,
            max_value: 0.0,
            latest_value: 0.0,
        }
    }
}

/// Append-only in-memory record log.
#[derive(Default)]
pub struct MetricLog {
    records: RwLock<Vec<MetricRecord>>,
}

impl MetricLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: MetricRecord) {
        self.records
            .write()
            .expect("metric log lock poisoned")
            .push(record);
    }

    /// Most recent records, newest last, optionally filtered by kind.
    pub fn recent(&self, kind: Option<&str>, limit: usize) -> Vec<MetricRecord> {
        let records = self.records.read().expect("metric log lock poisoned");
        let filtered: Vec<MetricRecord> = records
            .iter()
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned()
            .collect();
        let skip = filtered.len().saturating_sub(limit);
        filtered.into_iter().skip(skip).collect()
    }

    /// Aggregate records of `kind` within `period`, relative to now.
    pub fn summarize(&self, kind: &str, period: Period) -> MetricSummary {
        let cutoff = period.cutoff(Utc::now());
        let records = self.records.read().expect("metric log lock poisoned");

        let values: Vec<f64> = records
            .iter()
            .filter(|r| r.kind == kind)
            .filter(|r| cutoff.is_none_or(|c| r.timestamp >= c))
            .map(|r| r.value)
            .collect();

        if values.is_empty() {
            return MetricSummary::empty(kind, period);
        }

        let sum: f64 = values.iter().sum();
        MetricSummary {
            kind: kind.to_string(),
            period: period.as_str().to_string(),
            count: values.len(),
            average_value: sum / values.len() as f64,
            min_value: values.iter().copied().fold(f64::INFINITY, f64::min),
            max_value: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            latest_value: values[values.len() - 1],
        }
    }
}
