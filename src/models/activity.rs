use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    PointerMove,
    KeyPress,
    Scroll,
    WindowSwitch,
    Idle,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::PointerMove,
        ActivityKind::KeyPress,
        ActivityKind::Scroll,
        ActivityKind::WindowSwitch,
        ActivityKind::Idle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::PointerMove => "PointerMove",
            ActivityKind::KeyPress => "KeyPress",
            ActivityKind::Scroll => "Scroll",
            ActivityKind::WindowSwitch => "WindowSwitch",
            ActivityKind::Idle => "Idle",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum FocusLevel {
    Low,
    Medium,
    High,
}

impl FocusLevel {
    pub const HIGH_THRESHOLD: f64 = 80.0;
    pub const MEDIUM_THRESHOLD: f64 = 60.0;

    pub fn from_score(score: f64) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            FocusLevel::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            FocusLevel::Medium
        } else {
            FocusLevel::Low
        }
    }
}

/// One ring entry. Written once by the aggregator; a burst of same-kind input
/// may refresh `timestamp` and raise `intensity` in place before the next
/// point lands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDataPoint {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub intensity: f64,
    pub since_last_ms: u64,
    pub focus_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_level_boundaries() {
        assert_eq!(FocusLevel::from_score(100.0), FocusLevel::High);
        assert_eq!(FocusLevel::from_score(80.0), FocusLevel::High);
        assert_eq!(FocusLevel::from_score(79.99), FocusLevel::Medium);
        assert_eq!(FocusLevel::from_score(60.0), FocusLevel::Medium);
        assert_eq!(FocusLevel::from_score(59.9), FocusLevel::Low);
        assert_eq!(FocusLevel::from_score(0.0), FocusLevel::Low);
    }

    #[test]
    fn test_activity_kind_serializes_camel_case() {
        let json = serde_json::to_string(&ActivityKind::WindowSwitch).unwrap();
        assert_eq!(json, "\"windowSwitch\"");
    }
}
