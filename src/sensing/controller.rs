use anyhow::{anyhow, bail, Result};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::TrackerConfig;

use super::health::{LoopChannel, LoopHealthBoard};
use super::loop_worker::{keyboard_loop, pointer_loop, supervisory_loop, LoopTiming};
use super::sampler::Sampler;
use super::ActivitySink;

/// Handles of one tracking run's loops, sharing a single cancellation token.
pub struct RunningLoops {
    cancel_token: CancellationToken,
    handles: Vec<(LoopChannel, JoinHandle<()>)>,
}

impl RunningLoops {
    /// Cancels every loop and waits up to `timeout` for each to exit. A loop
    /// that fails to join or misses the deadline is logged (and aborted) and
    /// the remaining loops are still shut down.
    pub async fn shutdown(mut self, timeout: Duration) -> Result<()> {
        self.cancel_token.cancel();

        let mut failures = Vec::new();
        for (channel, handle) in self.handles.drain(..) {
            let abort = handle.abort_handle();
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    error!("{} loop failed to join: {join_err}", channel.as_str());
                    failures.push(channel.as_str());
                }
                Err(_) => {
                    warn!(
                        "{} loop did not stop within {}ms; aborting",
                        channel.as_str(),
                        timeout.as_millis()
                    );
                    abort.abort();
                    failures.push(channel.as_str());
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("loops did not shut down cleanly: {}", failures.join(", ")))
        }
    }
}

impl Drop for RunningLoops {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

pub struct SensingController {
    running: Option<RunningLoops>,
    health: LoopHealthBoard,
}

impl SensingController {
    pub fn new() -> Self {
        Self {
            running: None,
            health: LoopHealthBoard::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.running.is_some()
    }

    pub fn health(&self) -> &LoopHealthBoard {
        &self.health
    }

    pub fn start_sensing(
        &mut self,
        runtime: &Handle,
        sampler: Arc<Sampler>,
        sink: Arc<dyn ActivitySink>,
        config: &TrackerConfig,
    ) -> Result<()> {
        if self.running.is_some() {
            bail!("sensing already active");
        }

        // Loops from an earlier run may still be winding down; they keep
        // their own board.
        self.health = LoopHealthBoard::new();
        sampler.reset();

        let cancel_token = CancellationToken::new();
        let timing = LoopTiming {
            interval: config.sample_interval(),
            error_backoff: config.error_backoff(),
            max_consecutive_errors: config.max_consecutive_errors,
        };

        let pointer = runtime.spawn(pointer_loop(
            Arc::clone(&sampler),
            Arc::clone(&sink),
            Arc::clone(&self.health.pointer),
            timing,
            cancel_token.clone(),
        ));
        let keyboard = runtime.spawn(keyboard_loop(
            sampler,
            Arc::clone(&sink),
            Arc::clone(&self.health.keyboard),
            timing,
            cancel_token.clone(),
        ));
        let supervisor = runtime.spawn(supervisory_loop(
            sink,
            Arc::clone(&self.health.supervisor),
            config.supervisory_interval(),
            cancel_token.clone(),
        ));

        info!("sensing loops started");
        self.running = Some(RunningLoops {
            cancel_token,
            handles: vec![
                (LoopChannel::Pointer, pointer),
                (LoopChannel::Keyboard, keyboard),
                (LoopChannel::Supervisor, supervisor),
            ],
        });
        Ok(())
    }

    /// Detaches the running loops so they can be shut down without holding
    /// the controller.
    pub fn take_running(&mut self) -> Option<RunningLoops> {
        self.running.take()
    }
}

impl Default for SensingController {
    fn default() -> Self {
        Self::new()
    }
}
