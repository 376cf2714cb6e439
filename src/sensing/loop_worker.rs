use anyhow::Result;
use log::{error, info, warn};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::health::{LoopHealth, LoopStatus};
use super::sampler::Sampler;
use super::ActivitySink;

/// Timing shared by the sampling loops.
#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    pub interval: Duration,
    pub error_backoff: Duration,
    pub max_consecutive_errors: u32,
}

pub async fn pointer_loop(
    sampler: Arc<Sampler>,
    sink: Arc<dyn ActivitySink>,
    health: Arc<LoopHealth>,
    timing: LoopTiming,
    cancel_token: CancellationToken,
) {
    run_sampling_loop(&health, timing, &cancel_token, || {
        if let Some((kind, intensity)) = sampler.sample_pointer()? {
            sink.record_activity(kind, intensity);
        }
        if let Some((kind, intensity)) = sampler.sample_scroll(Instant::now())? {
            sink.record_activity(kind, intensity);
        }
        Ok(())
    })
    .await;
}

pub async fn keyboard_loop(
    sampler: Arc<Sampler>,
    sink: Arc<dyn ActivitySink>,
    health: Arc<LoopHealth>,
    timing: LoopTiming,
    cancel_token: CancellationToken,
) {
    run_sampling_loop(&health, timing, &cancel_token, || {
        if let Some((kind, intensity)) = sampler.sample_keyboard(Instant::now())? {
            sink.record_activity(kind, intensity);
        }
        Ok(())
    })
    .await;
}

/// Polls on a fixed cadence until cancelled. Failures back off and are
/// retried; after `max_consecutive_errors` in a row only this loop exits.
async fn run_sampling_loop<F>(
    health: &LoopHealth,
    timing: LoopTiming,
    cancel_token: &CancellationToken,
    mut poll: F,
) where
    F: FnMut() -> Result<()>,
{
    let channel = health.channel().as_str();
    let mut ticker = tokio::time::interval(timing.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    health.begin();

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel_token.cancelled() => break,
        }

        match poll() {
            Ok(()) => health.record_success(),
            Err(err) => {
                let attempt = health.record_error();
                warn!(
                    "{channel} sampling failed (attempt {attempt}/{}): {err:#}",
                    timing.max_consecutive_errors
                );

                if attempt >= timing.max_consecutive_errors {
                    error!("too many {channel} sampling errors, stopping {channel} loop");
                    health.set_status(LoopStatus::Terminated);
                    return;
                }

                tokio::select! {
                    _ = tokio::time::sleep(timing.error_backoff) => {}
                    _ = cancel_token.cancelled() => break,
                }
            }
        }
    }

    info!("{channel} loop shutting down");
    health.set_status(LoopStatus::Stopped);
}

/// Re-derives AFK status on a coarse cadence, independently of the sampling
/// loops, so silence is noticed even when no samples arrive.
pub async fn supervisory_loop(
    sink: Arc<dyn ActivitySink>,
    health: Arc<LoopHealth>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    health.begin();

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel_token.cancelled() => break,
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.check_afk()));
        match outcome {
            Ok(()) => health.record_success(),
            Err(_) => {
                health.record_error();
                error!("AFK check panicked; resetting AFK state");
                if panic::catch_unwind(AssertUnwindSafe(|| sink.reset_afk())).is_err() {
                    error!("AFK reset failed during recovery");
                }
            }
        }
    }

    info!("supervisor loop shutting down");
    health.set_status(LoopStatus::Stopped);
}
