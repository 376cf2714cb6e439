//! Input probe backed by a global rdev listener thread.
//!
//! rdev only offers a push-style hook, so the listener keeps the latest
//! observed state and the polling interface reads from it.

use anyhow::{anyhow, Context, Result};
use log::error;
use rdev::{listen, Event, EventType, Key};
use std::{
    mem,
    sync::{Arc, Mutex},
    thread,
};

use super::classify::{PointerPosition, WHEEL_DELTA};
use super::probe::InputProbe;

#[derive(Default)]
struct ListenerState {
    position: PointerPosition,
    pressed: Vec<Key>,
    scroll_accum: i64,
    failure: Option<String>,
}

pub struct RdevProbe {
    state: Arc<Mutex<ListenerState>>,
}

impl RdevProbe {
    pub fn spawn() -> Result<Self> {
        let state = Arc::new(Mutex::new(ListenerState::default()));
        let listener_state = Arc::clone(&state);

        thread::Builder::new()
            .name("lefocus-input".into())
            .spawn(move || {
                let callback_state = Arc::clone(&listener_state);
                let callback = move |event: Event| {
                    let mut guard = callback_state
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    match event.event_type {
                        EventType::KeyPress(key) => {
                            if !guard.pressed.contains(&key) {
                                guard.pressed.push(key);
                            }
                        }
                        EventType::KeyRelease(key) => guard.pressed.retain(|k| *k != key),
                        EventType::MouseMove { x, y } => guard.position = PointerPosition::new(x, y),
                        EventType::Wheel { delta_x, delta_y } => {
                            let units = (delta_x.abs() + delta_y.abs()) * WHEEL_DELTA as i64;
                            guard.scroll_accum = guard.scroll_accum.saturating_add(units);
                        }
                        _ => {}
                    }
                };

                if let Err(err) = listen(callback) {
                    error!("input listener stopped: {err:?}");
                    let mut guard = listener_state
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    guard.failure = Some(format!("{err:?}"));
                }
            })
            .context("failed to spawn input listener thread")?;

        Ok(Self { state })
    }

    fn read<T>(&self, f: impl FnOnce(&mut ListenerState) -> T) -> Result<T> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| anyhow!("input listener state poisoned"))?;
        if let Some(failure) = &guard.failure {
            return Err(anyhow!("input listener unavailable: {failure}"));
        }
        Ok(f(&mut guard))
    }
}

impl InputProbe for RdevProbe {
    fn pointer_position(&self) -> Result<PointerPosition> {
        self.read(|state| state.position)
    }

    fn any_key_down(&self) -> Result<bool> {
        self.read(|state| !state.pressed.is_empty())
    }

    fn take_scroll_delta(&self) -> Result<i64> {
        self.read(|state| mem::take(&mut state.scroll_accum))
    }
}
