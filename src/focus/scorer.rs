use chrono::Duration;
use serde::Serialize;
use std::collections::VecDeque;

use crate::models::{ActivityKind, FocusLevel};

use super::scoring::{clamp_focus, focus_delta, MAX_FOCUS_SCORE};

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FocusUpdate {
    pub delta: f64,
    pub score: f64,
    pub level: FocusLevel,
    pub level_changed: bool,
}

/// Running focus score plus the coarse level derived from it.
///
/// Not synchronised on its own; the recorder mutates it inside its critical
/// section.
#[derive(Debug, Clone)]
pub struct FocusScorer {
    score: f64,
    level: FocusLevel,
    level_history: VecDeque<FocusLevel>,
    history_cap: usize,
    recent_scores: VecDeque<f64>,
    score_window: usize,
    average: f64,
}

impl FocusScorer {
    pub fn new(history_cap: usize, score_window: usize) -> Self {
        Self {
            score: MAX_FOCUS_SCORE,
            level: FocusLevel::from_score(MAX_FOCUS_SCORE),
            level_history: VecDeque::with_capacity(history_cap),
            history_cap: history_cap.max(1),
            recent_scores: VecDeque::with_capacity(score_window),
            score_window: score_window.max(1),
            average: MAX_FOCUS_SCORE,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.history_cap, self.score_window);
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn level(&self) -> FocusLevel {
        self.level
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn level_history(&self) -> Vec<FocusLevel> {
        self.level_history.iter().copied().collect()
    }

    pub fn apply_activity(
        &mut self,
        kind: ActivityKind,
        intensity: f64,
        since_last: Duration,
    ) -> FocusUpdate {
        let delta = focus_delta(kind, intensity, since_last);
        self.score = clamp_focus(self.score + delta);
        let level_changed = self.refresh_level();
        self.push_recent();

        FocusUpdate {
            delta,
            score: self.score,
            level: self.level,
            level_changed,
        }
    }

    /// Flat penalty for leaving the task, independent of the activity delta.
    pub fn apply_distraction(&mut self, penalty: f64) -> FocusUpdate {
        let before = self.score;
        self.score = clamp_focus(self.score - penalty.abs());
        let level_changed = self.refresh_level();
        self.push_recent();

        FocusUpdate {
            delta: self.score - before,
            score: self.score,
            level: self.level,
            level_changed,
        }
    }

    fn refresh_level(&mut self) -> bool {
        let next = FocusLevel::from_score(self.score);
        if next == self.level {
            return false;
        }
        self.level = next;
        self.level_history.push_back(next);
        while self.level_history.len() > self.history_cap {
            self.level_history.pop_front();
        }
        true
    }

    fn push_recent(&mut self) {
        self.recent_scores.push_back(self.score);
        while self.recent_scores.len() > self.score_window {
            self.recent_scores.pop_front();
        }
        self.average = self.recent_scores.iter().sum::<f64>() / self.recent_scores.len() as f64;
    }
}

impl Default for FocusScorer {
    fn default() -> Self {
        Self::new(10, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_starts_at_full_focus() {
        let scorer = FocusScorer::default();
        assert_eq!(scorer.score(), 100.0);
        assert_eq!(scorer.level(), FocusLevel::High);
        assert!(scorer.level_history().is_empty());
    }

    #[test]
    fn test_positive_delta_is_clamped_at_ceiling() {
        let mut scorer = FocusScorer::default();
        let update = scorer.apply_activity(ActivityKind::KeyPress, 1.0, Duration::zero());
        assert!((update.delta - 0.8).abs() < 1e-9);
        assert_eq!(update.score, 100.0);
        assert!(!update.level_changed);
    }

    #[test]
    fn test_distraction_penalty_and_average() {
        let mut scorer = FocusScorer::default();
        scorer.apply_distraction(5.0);
        assert_eq!(scorer.score(), 95.0);
        scorer.apply_distraction(5.0);
        assert_eq!(scorer.score(), 90.0);
        assert!((scorer.average() - 92.5).abs() < 1e-9);
    }

    #[test]
    fn test_level_history_is_bounded() {
        let mut scorer = FocusScorer::new(3, 10);
        // Bounce between High and Medium around the 80 mark.
        for _ in 0..4 {
            scorer.apply_distraction(25.0);
            assert_eq!(scorer.level(), FocusLevel::Medium);
            for _ in 0..40 {
                scorer.apply_activity(ActivityKind::KeyPress, 2.0, Duration::zero());
            }
            assert_eq!(scorer.level(), FocusLevel::High);
        }
        let history = scorer.level_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history.last(), Some(&FocusLevel::High));
    }

    #[test]
    fn test_drains_to_floor() {
        let mut scorer = FocusScorer::default();
        for _ in 0..30 {
            scorer.apply_distraction(5.0);
        }
        assert_eq!(scorer.score(), 0.0);
        assert_eq!(scorer.level(), FocusLevel::Low);
    }

    fn any_kind() -> impl Strategy<Value = ActivityKind> {
        prop::sample::select(ActivityKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn test_score_stays_bounded(
            steps in prop::collection::vec(
                (any_kind(), -10.0f64..10.0, 0i64..120_000, any::<bool>()),
                1..300,
            )
        ) {
            let mut scorer = FocusScorer::default();
            for (kind, intensity, since_ms, distract) in steps {
                let update = scorer.apply_activity(kind, intensity, Duration::milliseconds(since_ms));
                prop_assert!((0.0..=100.0).contains(&update.score));
                if distract {
                    scorer.apply_distraction(5.0);
                }
                prop_assert!((0.0..=100.0).contains(&scorer.score()));
                prop_assert!((0.0..=100.0).contains(&scorer.average()));
            }
        }
    }
}
