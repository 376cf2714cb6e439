use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

use super::classify::{PointerPosition, WHEEL_DELTA};

/// Platform polling seam. Each call reads the current input state; none of
/// them may block for longer than a single poll.
pub trait InputProbe: Send + Sync {
    fn pointer_position(&self) -> Result<PointerPosition>;

    fn any_key_down(&self) -> Result<bool>;

    /// Wheel movement accumulated since the previous call, in raw wheel units.
    fn take_scroll_delta(&self) -> Result<i64>;
}

/// Probabilities for the synthetic user, evaluated once per poll.
#[derive(Debug, Clone)]
pub struct SimulatedProfile {
    pub move_probability: f64,
    pub key_probability: f64,
    pub scroll_probability: f64,
    /// Chance per pointer poll of walking away for `idle_duration`
    pub idle_probability: f64,
    pub idle_duration: Duration,
}

impl Default for SimulatedProfile {
    fn default() -> Self {
        Self {
            move_probability: 0.25,
            key_probability: 0.15,
            scroll_probability: 0.05,
            idle_probability: 0.0005,
            idle_duration: Duration::from_secs(150),
        }
    }
}

struct SimulatedState {
    rng: StdRng,
    position: PointerPosition,
    away_until: Option<Instant>,
}

/// Random-walk input source for headless runs and demos.
pub struct SimulatedProbe {
    profile: SimulatedProfile,
    state: Mutex<SimulatedState>,
}

impl SimulatedProbe {
    pub fn new(profile: SimulatedProfile) -> Self {
        Self::with_rng(profile, StdRng::from_entropy())
    }

    pub fn seeded(profile: SimulatedProfile, seed: u64) -> Self {
        Self::with_rng(profile, StdRng::seed_from_u64(seed))
    }

    fn with_rng(profile: SimulatedProfile, rng: StdRng) -> Self {
        Self {
            profile,
            state: Mutex::new(SimulatedState {
                rng,
                position: PointerPosition::new(640.0, 400.0),
                away_until: None,
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SimulatedState, &SimulatedProfile) -> T) -> T {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard, &self.profile)
    }
}

impl SimulatedState {
    fn is_away(&mut self) -> bool {
        match self.away_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                self.away_until = None;
                false
            }
            None => false,
        }
    }
}

impl InputProbe for SimulatedProbe {
    fn pointer_position(&self) -> Result<PointerPosition> {
        Ok(self.with_state(|state, profile| {
            if state.is_away() {
                return state.position;
            }
            if state.rng.gen_bool(profile.idle_probability.clamp(0.0, 1.0)) {
                state.away_until = Some(Instant::now() + profile.idle_duration);
                return state.position;
            }
            if state.rng.gen_bool(profile.move_probability.clamp(0.0, 1.0)) {
                state.position.x = (state.position.x + state.rng.gen_range(-40.0..40.0)).max(0.0);
                state.position.y = (state.position.y + state.rng.gen_range(-40.0..40.0)).max(0.0);
            }
            state.position
        }))
    }

    fn any_key_down(&self) -> Result<bool> {
        Ok(self.with_state(|state, profile| {
            !state.is_away() && state.rng.gen_bool(profile.key_probability.clamp(0.0, 1.0))
        }))
    }

    fn take_scroll_delta(&self) -> Result<i64> {
        Ok(self.with_state(|state, profile| {
            if state.is_away() || !state.rng.gen_bool(profile.scroll_probability.clamp(0.0, 1.0)) {
                return 0;
            }
            let notches: i64 = state.rng.gen_range(1..=3);
            let direction = if state.rng.gen_bool(0.5) { 1 } else { -1 };
            direction * notches * WHEEL_DELTA as i64
        }))
    }
}
