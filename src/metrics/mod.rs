pub mod formulas;
mod types;

pub use types::{EfficiencyMetrics, EfficiencyReport, TimeRange};

use chrono::{DateTime, Duration, Local, Utc};
use std::collections::VecDeque;

use crate::config::TrackerConfig;
use crate::models::{ActivityDataPoint, ActivityKind};
use crate::focus::scoring::clamp_intensity;

use formulas::{
    active_percentage, efficiency_score, productivity_index, recommendations,
    NO_DATA_RECOMMENDATION,
};

#[derive(Debug, Clone, Copy)]
struct RingLimits {
    max_points: usize,
    cleanup_threshold: usize,
    dedup_window: Duration,
    idle_gap: Duration,
}

/// Bounded ring of activity data points plus the running session counters
/// that the live, session and daily snapshots are computed from.
///
/// Like the focus scorer it carries no lock; the recorder serialises access.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    limits: RingLimits,
    points: VecDeque<ActivityDataPoint>,
    session_start: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    active_ms: u64,
    idle_ms: u64,
    activity_count: u64,
    distraction_count: u64,
    last_duration_ms: u64,
    current: EfficiencyMetrics,
    session: EfficiencyMetrics,
    daily: EfficiencyMetrics,
}

impl MetricsAggregator {
    pub fn new(config: &TrackerConfig, now: DateTime<Utc>) -> Self {
        Self {
            limits: RingLimits {
                max_points: config.max_data_points.max(1),
                cleanup_threshold: config.cleanup_threshold.min(config.max_data_points),
                dedup_window: config.dedup_window(),
                idle_gap: config.idle_gap(),
            },
            points: VecDeque::with_capacity(config.max_data_points.min(1024)),
            session_start: now,
            last_activity: now,
            active_ms: 0,
            idle_ms: 0,
            activity_count: 0,
            distraction_count: 0,
            last_duration_ms: 0,
            current: EfficiencyMetrics::default(),
            session: EfficiencyMetrics::default(),
            daily: EfficiencyMetrics::default(),
        }
    }

    /// Resets the session counters. The ring is kept so daily and ranged
    /// reports still see earlier sessions.
    pub fn start_session(&mut self, now: DateTime<Utc>) {
        self.session_start = now;
        self.last_activity = now;
        self.active_ms = 0;
        self.idle_ms = 0;
        self.activity_count = 0;
        self.distraction_count = 0;
        self.last_duration_ms = 0;
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn since_last_activity(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).max(Duration::zero())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &ActivityDataPoint> {
        self.points.iter()
    }

    /// Folds a same-kind burst into the previous point. Returns false when the
    /// activity needs a point of its own.
    pub fn try_coalesce(&mut self, kind: ActivityKind, intensity: f64, now: DateTime<Utc>) -> bool {
        let Some(last) = self.points.back_mut() else {
            return false;
        };
        if last.kind != kind || now - last.timestamp >= self.limits.dedup_window {
            return false;
        }

        last.intensity = last.intensity.max(clamp_intensity(intensity));
        last.timestamp = now;
        self.last_activity = now;
        true
    }

    pub fn push(
        &mut self,
        kind: ActivityKind,
        intensity: f64,
        now: DateTime<Utc>,
        focus_score: f64,
    ) -> ActivityDataPoint {
        let since_last = self.since_last_activity(now);
        let since_last_ms = since_last.num_milliseconds().max(0) as u64;
        if since_last > self.limits.idle_gap {
            self.idle_ms = self.idle_ms.saturating_add(since_last_ms);
        } else {
            self.active_ms = self.active_ms.saturating_add(since_last_ms);
        }

        self.last_activity = now;
        self.activity_count = self.activity_count.saturating_add(1);

        let point = ActivityDataPoint {
            timestamp: now,
            kind,
            intensity: clamp_intensity(intensity),
            since_last_ms,
            focus_score,
        };
        self.points.push_back(point.clone());
        self.evict();
        point
    }

    fn evict(&mut self) {
        let target = if self.points.len() > self.limits.max_points {
            self.limits.max_points
        } else if self.points.len() > self.limits.cleanup_threshold {
            self.limits.cleanup_threshold
        } else {
            return;
        };
        while self.points.len() > target {
            self.points.pop_front();
        }
    }

    pub fn record_distraction(&mut self) {
        self.distraction_count = self.distraction_count.saturating_add(1);
    }

    pub fn distraction_count(&self) -> u64 {
        self.distraction_count
    }

    fn session_duration_ms(&mut self, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - self.session_start).num_milliseconds().max(0) as u64;
        // Wall clocks can step backwards; snapshots must not.
        self.last_duration_ms = self.last_duration_ms.max(elapsed);
        self.last_duration_ms
    }

    fn running_metrics(&mut self, now: DateTime<Utc>, focus: f64, average: f64) -> EfficiencyMetrics {
        let duration_ms = self.session_duration_ms(now);
        let active_pct = active_percentage(self.active_ms, duration_ms);

        EfficiencyMetrics {
            focus_score: focus,
            average_focus_score: average,
            active_ms: self.active_ms,
            idle_ms: self.idle_ms,
            active_percentage: active_pct,
            efficiency_score: efficiency_score(active_pct, focus, self.distraction_count),
            productivity_index: productivity_index(
                self.activity_count,
                self.distraction_count,
                duration_ms,
            ),
            activity_count: self.activity_count,
            distraction_count: self.distraction_count,
            session_duration_ms: duration_ms,
        }
    }

    /// Recomputes the live snapshot and returns it.
    pub fn refresh_current(&mut self, now: DateTime<Utc>, focus: f64, average: f64) -> EfficiencyMetrics {
        self.current = self.running_metrics(now, focus, average);
        self.current.clone()
    }

    /// Closes the session: trailing silence counts as idle, the session
    /// snapshot is scored on the average focus and the daily snapshot is
    /// refreshed.
    pub fn end_session(&mut self, now: DateTime<Utc>, average: f64) -> EfficiencyMetrics {
        let trailing = self.since_last_activity(now).num_milliseconds().max(0) as u64;
        self.idle_ms = self.idle_ms.saturating_add(trailing);
        self.last_activity = now;

        self.session = self.running_metrics(now, average, average);
        self.daily = self.compute_daily(now);
        self.session.clone()
    }

    pub fn current(&self) -> EfficiencyMetrics {
        self.current.clone()
    }

    pub fn session(&self) -> EfficiencyMetrics {
        self.session.clone()
    }

    pub fn daily(&self) -> EfficiencyMetrics {
        self.daily.clone()
    }

    /// Recomputes the snapshot for the local calendar day containing `now`.
    pub fn refresh_daily(&mut self, now: DateTime<Utc>) -> EfficiencyMetrics {
        self.daily = self.compute_daily(now);
        self.daily.clone()
    }

    fn compute_daily(&self, now: DateTime<Utc>) -> EfficiencyMetrics {
        let today = now.with_timezone(&Local).date_naive();
        let todays: Vec<&ActivityDataPoint> = self
            .points
            .iter()
            .filter(|point| point.timestamp.with_timezone(&Local).date_naive() == today)
            .collect();
        scoped_metrics(&todays).unwrap_or_else(|| self.daily.clone())
    }

    /// Snapshot over the points inside `range`; the live ring is untouched.
    pub fn report(&self, range: TimeRange, now: DateTime<Utc>) -> EfficiencyReport {
        let relevant: Vec<&ActivityDataPoint> = self
            .points
            .iter()
            .filter(|point| range.contains(point.timestamp))
            .collect();

        match scoped_metrics(&relevant) {
            Some(metrics) => EfficiencyReport {
                range,
                generated_at: now,
                recommendations: recommendations(&metrics),
                metrics,
            },
            None => EfficiencyReport {
                range,
                generated_at: now,
                metrics: EfficiencyMetrics::default(),
                recommendations: vec![NO_DATA_RECOMMENDATION.to_string()],
            },
        }
    }

    /// Drops the ring and all snapshots. Session counters and the session
    /// start are kept, so later snapshots never show a shorter session.
    pub fn clear(&mut self) {
        self.points.clear();
        self.current = EfficiencyMetrics::default();
        self.session = EfficiencyMetrics::default();
        self.daily = EfficiencyMetrics::default();
    }
}

/// Metrics over an arbitrary subset of the ring. Distractions are counted as
/// window switches, since the subset carries no session counters.
fn scoped_metrics(points: &[&ActivityDataPoint]) -> Option<EfficiencyMetrics> {
    let first = points.iter().map(|p| p.timestamp).min()?;
    let last = points.iter().map(|p| p.timestamp).max()?;
    let span_ms = (last - first).num_milliseconds().max(0) as u64;

    let active_sum: u64 = points
        .iter()
        .filter(|p| p.kind != ActivityKind::Idle)
        .map(|p| p.since_last_ms)
        .sum();
    // The first point's gap may reach back before the window.
    let active_ms = active_sum.min(span_ms);

    let focus = points.iter().map(|p| p.focus_score).sum::<f64>() / points.len() as f64;
    let distractions = points
        .iter()
        .filter(|p| p.kind == ActivityKind::WindowSwitch)
        .count() as u64;
    let activity_count = points.len() as u64;
    let active_pct = active_percentage(active_ms, span_ms);

    Some(EfficiencyMetrics {
        focus_score: focus,
        average_focus_score: focus,
        active_ms,
        idle_ms: span_ms - active_ms,
        active_percentage: active_pct,
        efficiency_score: efficiency_score(active_pct, focus, distractions),
        productivity_index: productivity_index(activity_count, distractions, span_ms),
        activity_count,
        distraction_count: distractions,
        session_duration_ms: span_ms,
    })
}
