use serde::{Deserialize, Serialize};

use crate::focus::scoring::MAX_INTENSITY;

/// Raw wheel units per notch.
pub const WHEEL_DELTA: f64 = 120.0;

const PIXELS_PER_INTENSITY: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &PointerPosition) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// Movement counts once either axis moved past `threshold_px`.
pub fn is_significant_move(from: &PointerPosition, to: &PointerPosition, threshold_px: f64) -> bool {
    (to.x - from.x).abs() > threshold_px || (to.y - from.y).abs() > threshold_px
}

pub fn pointer_intensity(from: &PointerPosition, to: &PointerPosition) -> f64 {
    (from.distance_to(to) / PIXELS_PER_INTENSITY).min(MAX_INTENSITY)
}

pub fn scroll_intensity(delta: i64) -> f64 {
    (delta.unsigned_abs() as f64 / WHEEL_DELTA).min(MAX_INTENSITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_jitter_is_ignored() {
        let a = PointerPosition::new(100.0, 100.0);
        assert!(!is_significant_move(&a, &PointerPosition::new(105.0, 96.0), 5.0));
        assert!(is_significant_move(&a, &PointerPosition::new(106.0, 100.0), 5.0));
        assert!(is_significant_move(&a, &PointerPosition::new(100.0, 94.0), 5.0));
    }

    #[test]
    fn test_pointer_intensity_scales_then_caps() {
        let origin = PointerPosition::default();
        assert!((pointer_intensity(&origin, &PointerPosition::new(6.0, 8.0)) - 1.0).abs() < 1e-9);
        assert_eq!(pointer_intensity(&origin, &PointerPosition::new(300.0, 400.0)), 2.0);
    }

    #[test]
    fn test_scroll_intensity() {
        assert_eq!(scroll_intensity(120), 1.0);
        assert_eq!(scroll_intensity(-60), 0.5);
        assert_eq!(scroll_intensity(1200), 2.0);
        assert_eq!(scroll_intensity(0), 0.0);
    }
}
