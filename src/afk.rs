use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Public view of the away-from-keyboard state.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AfkState {
    pub is_afk: bool,
    pub since: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl Default for AfkState {
    fn default() -> Self {
        Self {
            is_afk: false,
            since: None,
            duration_ms: 0,
        }
    }
}

/// Two-state machine: Active until `threshold` of silence, then Away until the
/// next recorded activity.
#[derive(Debug, Clone)]
pub struct AfkDetector {
    threshold: Duration,
    state: AfkState,
}

impl AfkDetector {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            state: AfkState::default(),
        }
    }

    pub fn state(&self) -> AfkState {
        self.state
    }

    pub fn is_afk(&self) -> bool {
        self.state.is_afk
    }

    /// Re-derives the state from the last activity timestamp.
    ///
    /// Returns the silence length only on the Active -> Away edge; while
    /// already away the duration is refreshed without reporting.
    pub fn check(&mut self, now: DateTime<Utc>, last_activity: DateTime<Utc>) -> Option<Duration> {
        let silence = (now - last_activity).max(Duration::zero());
        let silence_ms = silence.num_milliseconds().max(0) as u64;

        if silence >= self.threshold {
            if self.state.is_afk {
                self.state.duration_ms = self.state.duration_ms.max(silence_ms);
                return None;
            }
            self.state = AfkState {
                is_afk: true,
                since: Some(last_activity),
                duration_ms: silence_ms,
            };
            return Some(silence);
        }

        if self.state.is_afk {
            self.state = AfkState::default();
        }
        None
    }

    /// Any recorded activity ends the away period immediately.
    pub fn on_activity(&mut self) {
        self.state = AfkState::default();
    }

    pub fn reset(&mut self) {
        self.state = AfkState::default();
    }
}
