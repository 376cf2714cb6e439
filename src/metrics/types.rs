use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Immutable efficiency snapshot. Each recomputation produces a new value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyMetrics {
    pub focus_score: f64,
    pub average_focus_score: f64,
    pub active_ms: u64,
    pub idle_ms: u64,
    pub active_percentage: f64,
    pub efficiency_score: f64,
    pub productivity_index: f64,
    pub activity_count: u64,
    pub distraction_count: u64,
    pub session_duration_ms: u64,
}

/// Inclusive window over recorded data point timestamps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `lookback` immediately preceding `now`.
    pub fn last(lookback: Duration, now: DateTime<Utc>) -> Self {
        Self {
            start: now - lookback,
            end: now,
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyReport {
    pub range: TimeRange,
    pub generated_at: DateTime<Utc>,
    pub metrics: EfficiencyMetrics,
    pub recommendations: Vec<String>,
}
