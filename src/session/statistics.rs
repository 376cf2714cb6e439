use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::TimeRange;
use crate::models::SessionRecord;

/// Aggregate view over the stored sessions that started inside `range`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyStatistics {
    pub range: TimeRange,
    pub generated_at: DateTime<Utc>,
    pub total_sessions: usize,
    pub total_duration_ms: u64,
    pub total_active_ms: u64,
    pub total_idle_ms: u64,
    pub total_activities: u64,
    pub total_distractions: u64,
    pub average_efficiency_score: f64,
    pub average_focus_score: f64,
    pub average_productivity_index: f64,
    pub average_active_percentage: f64,
    pub best_session: Option<SessionRecord>,
    pub worst_session: Option<SessionRecord>,
}

impl EfficiencyStatistics {
    pub fn empty(range: TimeRange, generated_at: DateTime<Utc>) -> Self {
        Self {
            range,
            generated_at,
            total_sessions: 0,
            total_duration_ms: 0,
            total_active_ms: 0,
            total_idle_ms: 0,
            total_activities: 0,
            total_distractions: 0,
            average_efficiency_score: 0.0,
            average_focus_score: 0.0,
            average_productivity_index: 0.0,
            average_active_percentage: 0.0,
            best_session: None,
            worst_session: None,
        }
    }

    pub fn from_sessions(
        range: TimeRange,
        sessions: &[SessionRecord],
        generated_at: DateTime<Utc>,
    ) -> Self {
        if sessions.is_empty() {
            return Self::empty(range, generated_at);
        }

        let count = sessions.len() as f64;
        let mean = |field: fn(&SessionRecord) -> f64| sessions.iter().map(field).sum::<f64>() / count;
        let total = |field: fn(&SessionRecord) -> u64| {
            sessions
                .iter()
                .map(field)
                .fold(0u64, |acc, value| acc.saturating_add(value))
        };

        let best_session = sessions
            .iter()
            .max_by(|a, b| {
                a.metrics
                    .efficiency_score
                    .total_cmp(&b.metrics.efficiency_score)
            })
            .cloned();
        let worst_session = sessions
            .iter()
            .min_by(|a, b| {
                a.metrics
                    .efficiency_score
                    .total_cmp(&b.metrics.efficiency_score)
            })
            .cloned();

        Self {
            range,
            generated_at,
            total_sessions: sessions.len(),
            total_duration_ms: total(|s| s.metrics.session_duration_ms),
            total_active_ms: total(|s| s.metrics.active_ms),
            total_idle_ms: total(|s| s.metrics.idle_ms),
            total_activities: total(|s| s.metrics.activity_count),
            total_distractions: total(|s| s.metrics.distraction_count),
            average_efficiency_score: mean(|s| s.metrics.efficiency_score),
            average_focus_score: mean(|s| s.metrics.focus_score),
            average_productivity_index: mean(|s| s.metrics.productivity_index),
            average_active_percentage: mean(|s| s.metrics.active_percentage),
            best_session,
            worst_session,
        }
    }
}
