//! Efficiency formulas shared by the live, session, daily and ranged
//! snapshots.

use super::EfficiencyMetrics;

const ACTIVE_WEIGHT: f64 = 0.4;
const FOCUS_WEIGHT: f64 = 0.4;
const DISTRACTION_COST: f64 = 2.0;
const MAX_DISTRACTION_PENALTY: f64 = 20.0;
const PRODUCTIVITY_SCALE: f64 = 10.0;

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

pub fn active_percentage(active_ms: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    clamp_percent(active_ms as f64 / duration_ms as f64 * 100.0)
}

pub fn efficiency_score(active_percentage: f64, focus_score: f64, distraction_count: u64) -> f64 {
    let base = ACTIVE_WEIGHT * active_percentage + FOCUS_WEIGHT * focus_score;
    let penalty = (DISTRACTION_COST * distraction_count as f64).min(MAX_DISTRACTION_PENALTY);
    clamp_percent(base - penalty)
}

pub fn productivity_index(activity_count: u64, distraction_count: u64, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    let minutes = duration_ms as f64 / 60_000.0;
    let activity_rate = activity_count as f64 / minutes;
    let distraction_rate = distraction_count as f64 / minutes;
    clamp_percent(PRODUCTIVITY_SCALE * (activity_rate / (distraction_rate + 1.0)))
}

pub const NO_DATA_RECOMMENDATION: &str = "No data available for the specified time range.";

pub fn recommendations(metrics: &EfficiencyMetrics) -> Vec<String> {
    let mut out = Vec::new();

    if metrics.active_percentage < 70.0 {
        out.push("Consider reducing idle time to improve productivity".to_string());
    }
    if metrics.focus_score < 60.0 {
        out.push("Try to minimize distractions and maintain focus".to_string());
    }
    if metrics.distraction_count > 10 {
        out.push("High distraction count detected - consider using focus mode".to_string());
    }

    let closing = if metrics.efficiency_score > 80.0 {
        "Excellent work efficiency! Keep up the great work!"
    } else if metrics.efficiency_score > 60.0 {
        "Good efficiency - room for improvement in focus areas"
    } else {
        "Consider taking breaks and reorganizing your work approach"
    };
    out.push(closing.to_string());

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_efficiency_weights_and_penalty() {
        assert!((efficiency_score(100.0, 100.0, 0) - 80.0).abs() < 1e-9);
        assert!((efficiency_score(50.0, 50.0, 3) - 34.0).abs() < 1e-9);
        // Penalty saturates at 20.
        assert!((efficiency_score(100.0, 100.0, 10_000) - 60.0).abs() < 1e-9);
        assert_eq!(efficiency_score(0.0, 0.0, 10_000), 0.0);
    }

    #[test]
    fn test_productivity_rates() {
        // 30 activities over 1 minute, no distractions: 10 * 30 capped at 100
        assert_eq!(productivity_index(30, 0, 60_000), 100.0);
        // 6 activities over 2 minutes with 2 distractions: 10 * (3 / 2)
        assert!((productivity_index(6, 2, 120_000) - 15.0).abs() < 1e-9);
        assert_eq!(productivity_index(50, 0, 0), 0.0);
    }

    #[test]
    fn test_recommendations_bands() {
        let strong = EfficiencyMetrics {
            active_percentage: 95.0,
            focus_score: 95.0,
            efficiency_score: 85.0,
            ..EfficiencyMetrics::default()
        };
        assert_eq!(
            recommendations(&strong),
            vec!["Excellent work efficiency! Keep up the great work!".to_string()]
        );

        let weak = EfficiencyMetrics {
            active_percentage: 20.0,
            focus_score: 30.0,
            distraction_count: 11,
            efficiency_score: 10.0,
            ..EfficiencyMetrics::default()
        };
        let recs = recommendations(&weak);
        assert_eq!(recs.len(), 4);
        assert!(recs[2].contains("focus mode"));
        assert!(recs[3].contains("taking breaks"));
    }

    proptest! {
        #[test]
        fn test_scores_stay_in_percent_range(
            active in -1_000.0f64..1_000.0,
            focus in -1_000.0f64..1_000.0,
            activities in 0u64..10_000_000,
            distractions in 0u64..10_000_000,
            duration_ms in 0u64..100_000_000,
        ) {
            let eff = efficiency_score(active, focus, distractions);
            prop_assert!((0.0..=100.0).contains(&eff));
            let prod = productivity_index(activities, distractions, duration_ms);
            prop_assert!((0.0..=100.0).contains(&prod));
        }
    }
}
