use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Tunable thresholds for the sampling loops, AFK detection and aggregation.
///
/// Loaded from a JSON file (camelCase keys); any key left out keeps its
/// default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Cadence of the pointer/scroll and keyboard loops
    pub sample_interval_ms: u64,

    /// Cadence of the coarse loop that re-derives AFK status
    pub supervisory_interval_ms: u64,

    /// Silence needed before the user is considered away
    pub afk_threshold_secs: u64,

    /// Per-axis pixel distance a pointer must travel to count as movement
    pub movement_threshold_px: f64,

    pub min_key_press_interval_ms: u64,
    pub min_scroll_interval_ms: u64,

    /// Consecutive poll failures after which a single loop gives up
    pub max_consecutive_errors: u32,
    pub error_backoff_ms: u64,

    /// Hard cap and proactive-eviction mark of the data point ring
    pub max_data_points: usize,
    pub cleanup_threshold: usize,

    /// Same-kind activities closer than this are coalesced into one point
    pub dedup_window_ms: u64,

    /// Inter-activity gaps longer than this count as idle time
    pub idle_gap_secs: u64,

    /// Upper bound on how long stop waits for each loop to exit
    pub stop_timeout_ms: u64,

    pub distraction_penalty: f64,
    pub recent_score_window: usize,
    pub focus_history_len: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100,
            supervisory_interval_ms: 1000,
            afk_threshold_secs: 120,
            movement_threshold_px: 5.0,
            min_key_press_interval_ms: 50,
            min_scroll_interval_ms: 30,
            max_consecutive_errors: 5,
            error_backoff_ms: 1000,
            max_data_points: 1000,
            cleanup_threshold: 800,
            dedup_window_ms: 50,
            idle_gap_secs: 5,
            stop_timeout_ms: 1000,
            distraction_penalty: 5.0,
            recent_score_window: 10,
            focus_history_len: 10,
        }
    }
}

impl TrackerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read tracker config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid tracker config in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 || self.supervisory_interval_ms == 0 {
            bail!("sampling intervals must be greater than zero");
        }
        // Loops only observe cancellation between sleeps.
        if self.sample_interval_ms > 1000
            || self.supervisory_interval_ms > 1000
            || self.error_backoff_ms > 1000
        {
            bail!("loop intervals above 1000ms would delay cancellation");
        }
        if self.max_data_points == 0 {
            bail!("max_data_points must be greater than zero");
        }
        if self.cleanup_threshold > self.max_data_points {
            bail!(
                "cleanup_threshold ({}) exceeds max_data_points ({})",
                self.cleanup_threshold,
                self.max_data_points
            );
        }
        if self.max_consecutive_errors == 0 {
            bail!("max_consecutive_errors must be at least 1");
        }
        if self.movement_threshold_px < 0.0 || !self.movement_threshold_px.is_finite() {
            bail!("movement_threshold_px must be a non-negative number");
        }
        if self.recent_score_window == 0 || self.focus_history_len == 0 {
            bail!("history windows must hold at least one entry");
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn supervisory_interval(&self) -> Duration {
        Duration::from_millis(self.supervisory_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn afk_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.afk_threshold_secs as i64)
    }

    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.dedup_window_ms as i64)
    }

    pub fn idle_gap(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idle_gap_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_cleanup_above_cap() {
        let config = TrackerConfig {
            cleanup_threshold: 1200,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_slow_loops() {
        let config = TrackerConfig {
            supervisory_interval_ms: 5000,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "afkThresholdSecs": 30, "sampleIntervalMs": 250 }}"#).unwrap();

        let config = TrackerConfig::load(file.path()).unwrap();
        assert_eq!(config.afk_threshold_secs, 30);
        assert_eq!(config.sample_interval_ms, 250);
        assert_eq!(config.max_data_points, 1000);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(TrackerConfig::load(file.path()).is_err());
    }
}
