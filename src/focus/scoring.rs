//! Static scoring tables for the running focus score.
//!
//! Kept free of state so the formula can be checked in isolation from the
//! sampling loops.

use chrono::Duration;

use crate::models::ActivityKind;

pub const MIN_FOCUS_SCORE: f64 = 0.0;
pub const MAX_FOCUS_SCORE: f64 = 100.0;
pub const MIN_INTENSITY: f64 = 0.1;
pub const MAX_INTENSITY: f64 = 2.0;

pub fn kind_multiplier(kind: ActivityKind) -> f64 {
    match kind {
        ActivityKind::PointerMove => 0.3,
        ActivityKind::KeyPress => 0.8,
        ActivityKind::Scroll => 0.4,
        ActivityKind::WindowSwitch => -0.5,
        ActivityKind::Idle => -0.1,
    }
}

/// Decay applied by elapsed-time bucket: <1s, <5s, <10s, <30s, beyond.
pub fn time_multiplier(since_last: Duration) -> f64 {
    let secs = since_last.num_milliseconds().max(0) as f64 / 1000.0;
    match secs {
        s if s < 1.0 => 1.0,
        s if s < 5.0 => 0.8,
        s if s < 10.0 => 0.6,
        s if s < 30.0 => 0.3,
        _ => 0.1,
    }
}

/// Zero-intensity samples still count as `MIN_INTENSITY`.
pub fn clamp_intensity(intensity: f64) -> f64 {
    if intensity.is_nan() {
        return MIN_INTENSITY;
    }
    intensity.clamp(MIN_INTENSITY, MAX_INTENSITY)
}

pub fn clamp_focus(score: f64) -> f64 {
    if score.is_nan() {
        return MIN_FOCUS_SCORE;
    }
    score.clamp(MIN_FOCUS_SCORE, MAX_FOCUS_SCORE)
}

pub fn focus_delta(kind: ActivityKind, intensity: f64, since_last: Duration) -> f64 {
    kind_multiplier(kind) * time_multiplier(since_last) * clamp_intensity(intensity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_buckets() {
        assert_eq!(time_multiplier(Duration::milliseconds(0)), 1.0);
        assert_eq!(time_multiplier(Duration::milliseconds(999)), 1.0);
        assert_eq!(time_multiplier(Duration::seconds(1)), 0.8);
        assert_eq!(time_multiplier(Duration::milliseconds(4_999)), 0.8);
        assert_eq!(time_multiplier(Duration::seconds(5)), 0.6);
        assert_eq!(time_multiplier(Duration::seconds(10)), 0.3);
        assert_eq!(time_multiplier(Duration::seconds(29)), 0.3);
        assert_eq!(time_multiplier(Duration::seconds(30)), 0.1);
        assert_eq!(time_multiplier(Duration::hours(3)), 0.1);
    }

    #[test]
    fn test_negative_elapsed_counts_as_fresh() {
        assert_eq!(time_multiplier(Duration::seconds(-4)), 1.0);
    }

    #[test]
    fn test_intensity_clamp_keeps_idle_floor() {
        assert_eq!(clamp_intensity(0.0), MIN_INTENSITY);
        assert_eq!(clamp_intensity(-3.0), MIN_INTENSITY);
        assert_eq!(clamp_intensity(7.5), MAX_INTENSITY);
        assert_eq!(clamp_intensity(f64::NAN), MIN_INTENSITY);
        assert_eq!(clamp_intensity(1.3), 1.3);
    }

    #[test]
    fn test_delta_examples() {
        let key = focus_delta(ActivityKind::KeyPress, 1.0, Duration::zero());
        assert!((key - 0.8).abs() < 1e-9);

        let switch = focus_delta(ActivityKind::WindowSwitch, 1.0, Duration::seconds(40));
        assert!((switch + 0.05).abs() < 1e-9);

        // Idle at zero intensity still subtracts 0.1 * 1.0 * 0.1
        let idle = focus_delta(ActivityKind::Idle, 0.0, Duration::zero());
        assert!((idle + 0.01).abs() < 1e-9);
    }
}
