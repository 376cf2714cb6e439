use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::afk::{AfkDetector, AfkState};
use crate::config::TrackerConfig;
use crate::events::TrackerEvent;
use crate::focus::{scoring::clamp_intensity, FocusScorer};
use crate::metrics::{EfficiencyMetrics, MetricsAggregator};
use crate::models::ActivityKind;

/// Everything the recorder mutates, guarded as one unit.
///
/// Methods return the events to publish; the caller dispatches them after
/// releasing the lock.
pub struct RecorderState {
    tracking: bool,
    last_activity: DateTime<Utc>,
    distraction_penalty: f64,
    afk: AfkDetector,
    scorer: FocusScorer,
    aggregator: MetricsAggregator,
    activity_counts: BTreeMap<ActivityKind, u64>,
    counts_reset_at: DateTime<Utc>,
}

impl RecorderState {
    pub fn new(config: &TrackerConfig, now: DateTime<Utc>) -> Self {
        Self {
            tracking: false,
            last_activity: now,
            distraction_penalty: config.distraction_penalty,
            afk: AfkDetector::new(config.afk_threshold()),
            scorer: FocusScorer::new(config.focus_history_len, config.recent_score_window),
            aggregator: MetricsAggregator::new(config, now),
            activity_counts: BTreeMap::new(),
            counts_reset_at: now,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Returns false when tracking was already on.
    pub fn begin_tracking(&mut self, now: DateTime<Utc>) -> bool {
        if self.tracking {
            return false;
        }
        self.tracking = true;
        self.last_activity = now;
        self.afk.reset();
        self.scorer.reset();
        self.aggregator.start_session(now);
        true
    }

    /// Returns false when tracking was already off.
    pub fn end_tracking(&mut self) -> bool {
        if !self.tracking {
            return false;
        }
        self.tracking = false;
        self.afk.reset();
        self.scorer.reset();
        true
    }

    pub fn record_activity(
        &mut self,
        kind: ActivityKind,
        intensity: f64,
        now: DateTime<Utc>,
    ) -> Option<Vec<TrackerEvent>> {
        if !self.tracking {
            return None;
        }
        let mut events = Vec::with_capacity(2);
        self.apply_activity(kind, intensity, now, &mut events);
        events.push(self.efficiency_updated(now));
        Some(events)
    }

    pub fn record_distraction(&mut self, now: DateTime<Utc>) -> Option<Vec<TrackerEvent>> {
        if !self.tracking {
            return None;
        }
        let mut events = Vec::with_capacity(2);
        self.apply_distraction(now, &mut events);
        events.push(self.efficiency_updated(now));
        Some(events)
    }

    /// Window switch activity and the distraction it implies, in one step.
    pub fn record_window_switch(&mut self, now: DateTime<Utc>) -> Option<Vec<TrackerEvent>> {
        if !self.tracking {
            return None;
        }
        let mut events = Vec::with_capacity(3);
        self.apply_activity(ActivityKind::WindowSwitch, 1.0, now, &mut events);
        self.apply_distraction(now, &mut events);
        events.push(self.efficiency_updated(now));
        Some(events)
    }

    fn apply_activity(
        &mut self,
        kind: ActivityKind,
        intensity: f64,
        now: DateTime<Utc>,
        events: &mut Vec<TrackerEvent>,
    ) {
        // Away ends before anything is derived from this activity.
        self.afk.on_activity();
        self.last_activity = now;
        *self.activity_counts.entry(kind).or_insert(0) += 1;

        if !self.aggregator.try_coalesce(kind, intensity, now) {
            let since_last = self.aggregator.since_last_activity(now);
            let update = self.scorer.apply_activity(kind, intensity, since_last);
            self.aggregator.push(kind, intensity, now, update.score);
        }
        self.afk.check(now, self.last_activity);

        events.push(TrackerEvent::ActivityDetected {
            kind,
            intensity: clamp_intensity(intensity),
            timestamp: now,
        });
    }

    fn apply_distraction(&mut self, now: DateTime<Utc>, events: &mut Vec<TrackerEvent>) {
        self.aggregator.record_distraction();
        self.scorer.apply_distraction(self.distraction_penalty);
        events.push(TrackerEvent::FocusLost { timestamp: now });
    }

    fn efficiency_updated(&mut self, now: DateTime<Utc>) -> TrackerEvent {
        let metrics =
            self.aggregator
                .refresh_current(now, self.scorer.score(), self.scorer.average());
        TrackerEvent::EfficiencyUpdated { metrics }
    }

    pub fn check_afk(&mut self, now: DateTime<Utc>) -> Option<TrackerEvent> {
        if !self.tracking {
            return None;
        }
        let silence = self.afk.check(now, self.last_activity)?;
        Some(TrackerEvent::AfkDetected {
            duration_ms: silence.num_milliseconds().max(0) as u64,
            since: self.last_activity,
        })
    }

    /// Safe default after a failed check: active, zero duration, fresh
    /// silence window.
    pub fn reset_afk(&mut self, now: DateTime<Utc>) {
        self.afk.reset();
        self.last_activity = now;
    }

    pub fn afk_state(&self) -> AfkState {
        self.afk.state()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn scorer(&self) -> &FocusScorer {
        &self.scorer
    }

    pub fn aggregator(&self) -> &MetricsAggregator {
        &self.aggregator
    }

    pub fn aggregator_mut(&mut self) -> &mut MetricsAggregator {
        &mut self.aggregator
    }

    pub fn start_session(&mut self, now: DateTime<Utc>) {
        self.scorer.reset();
        self.aggregator.start_session(now);
    }

    /// Closes the session snapshot and opens a fresh window.
    pub fn end_session(&mut self, now: DateTime<Utc>) -> (EfficiencyMetrics, TrackerEvent) {
        let metrics = self.aggregator.end_session(now, self.scorer.average());
        self.scorer.reset();
        self.afk.reset();
        self.last_activity = now;
        self.aggregator.start_session(now);
        let event = TrackerEvent::EfficiencyUpdated {
            metrics: metrics.clone(),
        };
        (metrics, event)
    }

    pub fn activity_counts(&self) -> BTreeMap<ActivityKind, u64> {
        self.activity_counts.clone()
    }

    pub fn counts_reset_at(&self) -> DateTime<Utc> {
        self.counts_reset_at
    }

    pub fn reset_activity_counts(&mut self, now: DateTime<Utc>) {
        self.activity_counts.clear();
        self.counts_reset_at = now;
    }

    /// Wipes the ring, running focus and snapshots. AFK, the tracking flag
    /// and the session counters are left alone.
    pub fn clear_data(&mut self) {
        self.aggregator.clear();
        self.scorer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tracking_state() -> (RecorderState, DateTime<Utc>) {
        let now = Utc::now();
        let mut state = RecorderState::new(&TrackerConfig::default(), now);
        assert!(state.begin_tracking(now));
        (state, now)
    }

    #[test]
    fn test_ignored_when_not_tracking() {
        let now = Utc::now();
        let mut state = RecorderState::new(&TrackerConfig::default(), now);
        assert!(state.record_activity(ActivityKind::KeyPress, 1.0, now).is_none());
        assert!(state.record_distraction(now).is_none());
        assert!(state.check_afk(now + Duration::hours(1)).is_none());
        assert!(state.aggregator().is_empty());
    }

    #[test]
    fn test_activity_emits_detected_then_updated() {
        let (mut state, t0) = tracking_state();
        let events = state.record_activity(ActivityKind::Scroll, 1.0, t0).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "activity-detected");
        assert_eq!(events[1].name(), "efficiency-updated");
    }

    #[test]
    fn test_window_switch_counts_once_as_distraction() {
        let (mut state, t0) = tracking_state();
        let events = state.record_window_switch(t0 + Duration::seconds(2)).unwrap();
        let names: Vec<_> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["activity-detected", "focus-lost", "efficiency-updated"]);
        assert_eq!(state.aggregator().distraction_count(), 1);
        // -0.5 * 0.8 * 1.0 then the flat -5
        assert!((state.scorer().score() - 94.6).abs() < 1e-9);
    }

    #[test]
    fn test_activity_clears_afk_before_scoring() {
        let (mut state, t0) = tracking_state();
        let away = t0 + Duration::seconds(200);
        assert!(state.check_afk(away).is_some());
        assert!(state.afk_state().is_afk);

        state.record_activity(ActivityKind::PointerMove, 1.0, away).unwrap();
        assert_eq!(state.afk_state(), AfkState::default());
    }

    #[test]
    fn test_clear_data_keeps_tracking_and_afk() {
        let (mut state, t0) = tracking_state();
        state.record_activity(ActivityKind::KeyPress, 1.0, t0).unwrap();
        state.check_afk(t0 + Duration::seconds(150));
        state.clear_data();
        assert!(state.is_tracking());
        assert!(state.afk_state().is_afk);
        assert!(state.aggregator().is_empty());
        assert_eq!(state.scorer().score(), 100.0);
    }

    #[test]
    fn test_counts_survive_coalescing() {
        let (mut state, t0) = tracking_state();
        for i in 0..5 {
            state
                .record_activity(ActivityKind::PointerMove, 1.0, t0 + Duration::milliseconds(i))
                .unwrap();
        }
        assert_eq!(state.aggregator().len(), 1);
        assert_eq!(state.activity_counts().get(&ActivityKind::PointerMove), Some(&5));
        state.reset_activity_counts(t0);
        assert!(state.activity_counts().is_empty());
    }
}
