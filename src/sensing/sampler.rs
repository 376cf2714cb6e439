use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

use crate::config::TrackerConfig;
use crate::models::ActivityKind;

use super::classify::{is_significant_move, pointer_intensity, scroll_intensity, PointerPosition};
use super::probe::InputProbe;
use super::ActivitySink;

/// Activity classified from one poll.
pub type Signal = (ActivityKind, f64);

#[derive(Debug, Default)]
struct SamplerState {
    last_position: Option<PointerPosition>,
    last_key_press: Option<Instant>,
    last_scroll: Option<Instant>,
}

/// Turns raw probe readings into classified activity signals.
///
/// The last-seen pointer position and the per-channel rate limits live
/// behind one mutex, so the pointer and keyboard loops (and a host UI tick)
/// can sample concurrently.
pub struct Sampler {
    probe: Arc<dyn InputProbe>,
    state: Mutex<SamplerState>,
    movement_threshold_px: f64,
    min_key_press_interval: Duration,
    min_scroll_interval: Duration,
}

impl Sampler {
    pub fn new(probe: Arc<dyn InputProbe>, config: &TrackerConfig) -> Self {
        Self {
            probe,
            state: Mutex::new(SamplerState::default()),
            movement_threshold_px: config.movement_threshold_px,
            min_key_press_interval: Duration::from_millis(config.min_key_press_interval_ms),
            min_scroll_interval: Duration::from_millis(config.min_scroll_interval_ms),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SamplerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Forgets rate limits and anchors movement at the current position.
    pub fn reset(&self) {
        let anchor = self.probe.pointer_position().ok();
        let mut state = self.lock();
        *state = SamplerState {
            last_position: anchor,
            ..SamplerState::default()
        };
    }

    pub fn sample_pointer(&self) -> Result<Option<Signal>> {
        let position = self
            .probe
            .pointer_position()
            .context("pointer position poll failed")?;

        let mut state = self.lock();
        let Some(previous) = state.last_position else {
            state.last_position = Some(position);
            return Ok(None);
        };
        if !is_significant_move(&previous, &position, self.movement_threshold_px) {
            return Ok(None);
        }

        state.last_position = Some(position);
        Ok(Some((ActivityKind::PointerMove, pointer_intensity(&previous, &position))))
    }

    pub fn sample_scroll(&self, now: Instant) -> Result<Option<Signal>> {
        let delta = self
            .probe
            .take_scroll_delta()
            .context("scroll delta poll failed")?;
        if delta == 0 {
            return Ok(None);
        }

        let mut state = self.lock();
        if !interval_elapsed(state.last_scroll, now, self.min_scroll_interval) {
            return Ok(None);
        }
        state.last_scroll = Some(now);
        Ok(Some((ActivityKind::Scroll, scroll_intensity(delta))))
    }

    pub fn sample_keyboard(&self, now: Instant) -> Result<Option<Signal>> {
        let down = self
            .probe
            .any_key_down()
            .context("keyboard state poll failed")?;
        if !down {
            return Ok(None);
        }

        let mut state = self.lock();
        if !interval_elapsed(state.last_key_press, now, self.min_key_press_interval) {
            return Ok(None);
        }
        state.last_key_press = Some(now);
        Ok(Some((ActivityKind::KeyPress, 1.0)))
    }

    /// One pass over every channel followed by an AFK check, for hosts that
    /// drive sampling from their own tick instead of the background loops.
    /// A failing channel does not prevent the others from being sampled; the
    /// first failure is returned after the pass. Yields how many activities
    /// the sink accepted.
    pub fn poll_once(&self, sink: &dyn ActivitySink) -> Result<usize> {
        let now = Instant::now();
        let mut accepted = 0;
        let mut first_error = None;

        let readings = [
            self.sample_pointer(),
            self.sample_scroll(now),
            self.sample_keyboard(now),
        ];
        for reading in readings {
            match reading {
                Ok(Some((kind, intensity))) => {
                    if sink.record_activity(kind, intensity) {
                        accepted += 1;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        sink.check_afk();

        match first_error {
            Some(err) => Err(err),
            None => Ok(accepted),
        }
    }
}

fn interval_elapsed(last: Option<Instant>, now: Instant, min: Duration) -> bool {
    last.map(|at| now.saturating_duration_since(at) >= min)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FixedProbe {
        position: StdMutex<PointerPosition>,
        key_down: StdMutex<bool>,
        scroll: StdMutex<i64>,
    }

    impl InputProbe for FixedProbe {
        fn pointer_position(&self) -> Result<PointerPosition> {
            Ok(*self.position.lock().unwrap())
        }

        fn any_key_down(&self) -> Result<bool> {
            Ok(*self.key_down.lock().unwrap())
        }

        fn take_scroll_delta(&self) -> Result<i64> {
            Ok(std::mem::take(&mut *self.scroll.lock().unwrap()))
        }
    }

    fn sampler() -> (Sampler, Arc<FixedProbe>) {
        let probe = Arc::new(FixedProbe::default());
        let sampler = Sampler::new(probe.clone(), &TrackerConfig::default());
        sampler.reset();
        (sampler, probe)
    }

    #[test]
    fn test_pointer_needs_threshold() {
        let (sampler, probe) = sampler();
        *probe.position.lock().unwrap() = PointerPosition::new(3.0, 4.0);
        assert_eq!(sampler.sample_pointer().unwrap(), None);

        *probe.position.lock().unwrap() = PointerPosition::new(30.0, 40.0);
        let (kind, intensity) = sampler.sample_pointer().unwrap().unwrap();
        assert_eq!(kind, ActivityKind::PointerMove);
        assert!((intensity - 2.0).abs() < 1e-9);

        // Position was re-anchored; no movement means no signal.
        assert_eq!(sampler.sample_pointer().unwrap(), None);
    }

    #[test]
    fn test_keyboard_rate_limited() {
        let (sampler, probe) = sampler();
        *probe.key_down.lock().unwrap() = true;
        let t0 = Instant::now();

        assert_eq!(
            sampler.sample_keyboard(t0).unwrap(),
            Some((ActivityKind::KeyPress, 1.0))
        );
        assert_eq!(sampler.sample_keyboard(t0 + Duration::from_millis(20)).unwrap(), None);
        assert!(sampler
            .sample_keyboard(t0 + Duration::from_millis(60))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_scroll_scaled_by_wheel_unit() {
        let (sampler, probe) = sampler();
        *probe.scroll.lock().unwrap() = -180;
        let (kind, intensity) = sampler.sample_scroll(Instant::now()).unwrap().unwrap();
        assert_eq!(kind, ActivityKind::Scroll);
        assert!((intensity - 1.5).abs() < 1e-9);
        assert_eq!(sampler.sample_scroll(Instant::now()).unwrap(), None);
    }

    #[derive(Default)]
    struct CountingSink {
        accepted: StdMutex<Vec<ActivityKind>>,
        afk_checks: StdMutex<u32>,
    }

    impl ActivitySink for CountingSink {
        fn record_activity(&self, kind: ActivityKind, _intensity: f64) -> bool {
            self.accepted.lock().unwrap().push(kind);
            true
        }

        fn check_afk(&self) {
            *self.afk_checks.lock().unwrap() += 1;
        }

        fn reset_afk(&self) {}
    }

    #[test]
    fn test_poll_once_samples_every_channel() {
        let (sampler, probe) = sampler();
        *probe.position.lock().unwrap() = PointerPosition::new(50.0, 0.0);
        *probe.key_down.lock().unwrap() = true;
        *probe.scroll.lock().unwrap() = 120;

        let sink = CountingSink::default();
        assert_eq!(sampler.poll_once(&sink).unwrap(), 3);
        assert_eq!(
            *sink.accepted.lock().unwrap(),
            vec![ActivityKind::PointerMove, ActivityKind::Scroll, ActivityKind::KeyPress]
        );
        assert_eq!(*sink.afk_checks.lock().unwrap(), 1);
    }
}
