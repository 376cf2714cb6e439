use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use tokio::{runtime::Handle, sync::broadcast};

use crate::{
    afk::AfkState,
    clock::{Clock, SystemClock},
    config::TrackerConfig,
    diagnostics::{ProcessSampler, TrackerDiagnostics},
    events::{EventBus, SubscriptionId, TrackerEvent},
    metrics::{EfficiencyMetrics, EfficiencyReport, TimeRange},
    models::{ActivityKind, FocusLevel},
    sensing::{ActivitySink, InputProbe, Sampler, SensingController},
};

use super::state::RecorderState;

/// Public face of the engine. Cheap to clone; every clone drives the same
/// tracker.
///
/// Write entry points are synchronous and never fail: they return whether
/// the call was recorded. Only starting and stopping the background loops
/// can report an error.
#[derive(Clone)]
pub struct ActivityTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<RecorderState>,
    bus: EventBus,
    sampler: Arc<Sampler>,
    sensing: Mutex<SensingController>,
    runtime: Mutex<Option<Handle>>,
    process: Mutex<ProcessSampler>,
}

/// What the loops hold on to. Weak so that dropping the last tracker handle
/// drops the controller, whose running loops cancel themselves.
struct LoopSink(Weak<TrackerInner>);

impl ActivitySink for LoopSink {
    fn record_activity(&self, kind: ActivityKind, intensity: f64) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.record_activity(kind, intensity))
            .unwrap_or(false)
    }

    fn check_afk(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.check_afk();
        }
    }

    fn reset_afk(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.reset_afk();
        }
    }
}

impl ActivitySink for TrackerInner {
    fn record_activity(&self, kind: ActivityKind, intensity: f64) -> bool {
        let now = self.clock.now();
        let events = self.lock_state().record_activity(kind, intensity, now);
        match events {
            Some(events) => {
                debug!("recorded {} (intensity {intensity:.2})", kind.as_str());
                self.bus.dispatch_all(events);
                true
            }
            None => false,
        }
    }

    fn check_afk(&self) {
        let now = self.clock.now();
        let event = self.lock_state().check_afk(now);
        if let Some(event) = event {
            info!("user went AFK");
            self.bus.dispatch(event);
        }
    }

    fn reset_afk(&self) {
        let now = self.clock.now();
        self.lock_state().reset_afk(now);
    }
}

impl TrackerInner {
    /// A poisoned lock means a panic mid-update. The data is kept, but AFK
    /// falls back to Active so a half-applied transition cannot stick.
    fn lock_state(&self) -> MutexGuard<'_, RecorderState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("recorder state poisoned, resetting AFK state");
                let mut guard = poisoned.into_inner();
                self.state.clear_poison();
                let now = self.clock.now();
                guard.reset_afk(now);
                guard
            }
        }
    }

    fn lock_sensing(&self) -> MutexGuard<'_, SensingController> {
        self.sensing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ActivityTracker {
    pub fn new(
        config: TrackerConfig,
        probe: Arc<dyn InputProbe>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().context("invalid tracker config")?;

        let now = clock.now();
        let sampler = Arc::new(Sampler::new(probe, &config));
        Ok(Self {
            inner: Arc::new(TrackerInner {
                state: Mutex::new(RecorderState::new(&config, now)),
                bus: EventBus::new(),
                sampler,
                sensing: Mutex::new(SensingController::new()),
                runtime: Mutex::new(Handle::try_current().ok()),
                process: Mutex::new(ProcessSampler::new()),
                clock,
                config,
            }),
        })
    }

    pub fn with_system_clock(config: TrackerConfig, probe: Arc<dyn InputProbe>) -> Result<Self> {
        Self::new(config, probe, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Sets the runtime the sampling loops are spawned on. A tracker built
    /// inside a runtime already uses that one.
    pub fn attach_runtime(&self, runtime: Handle) {
        *self
            .inner
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(runtime);
    }

    fn runtime(&self) -> Result<Handle> {
        let attached = self
            .inner
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match attached {
            Some(runtime) => Ok(runtime),
            None => Handle::try_current()
                .context("start_tracking needs a tokio runtime; build the tracker inside one or call attach_runtime"),
        }
    }

    /// Enables recording and spawns the sampling loops on the tracker's
    /// runtime. Callable from any thread. Calling it while already tracking
    /// is a no-op.
    pub fn start_tracking(&self) -> Result<()> {
        let runtime = self.runtime()?;

        let mut sensing = self.inner.lock_sensing();
        let now = self.inner.clock.now();
        if !self.inner.lock_state().begin_tracking(now) {
            debug!("start_tracking called while already tracking");
            return Ok(());
        }

        if let Some(leftover) = sensing.take_running() {
            warn!("replacing sensing loops left over from an unfinished stop");
            let timeout = self.inner.config.stop_timeout();
            runtime.spawn(async move {
                if let Err(err) = leftover.shutdown(timeout).await {
                    warn!("{err:#}");
                }
            });
        }

        let sink: Arc<dyn ActivitySink> = Arc::new(LoopSink(Arc::downgrade(&self.inner)));
        if let Err(err) = sensing.start_sensing(
            &runtime,
            Arc::clone(&self.inner.sampler),
            sink,
            &self.inner.config,
        ) {
            self.inner.lock_state().end_tracking();
            return Err(err.context("failed to start sensing loops"));
        }

        info!("activity tracking started");
        Ok(())
    }

    /// Disables recording, then cancels the loops and waits for each one
    /// for at most the configured stop timeout. Safe to call repeatedly.
    ///
    /// Recording is off before this returns even if a loop failed to exit
    /// in time; the error only reports that.
    pub async fn stop_tracking(&self) -> Result<()> {
        // Flag and loops change together so a concurrent start sees either
        // both before or both after.
        let (was_tracking, running) = {
            let mut sensing = self.inner.lock_sensing();
            let was_tracking = self.inner.lock_state().end_tracking();
            (was_tracking, sensing.take_running())
        };

        let Some(running) = running else {
            if was_tracking {
                info!("activity tracking stopped");
            }
            return Ok(());
        };

        let outcome = running.shutdown(self.inner.config.stop_timeout()).await;
        match &outcome {
            Ok(()) => info!("activity tracking stopped"),
            Err(err) => warn!("activity tracking stopped with errors: {err:#}"),
        }
        outcome
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.lock_state().is_tracking()
    }

    pub fn record_activity(&self, kind: ActivityKind, intensity: f64) -> bool {
        self.inner.record_activity(kind, intensity)
    }

    pub fn record_distraction(&self) -> bool {
        let now = self.inner.clock.now();
        let events = self.inner.lock_state().record_distraction(now);
        self.publish(events)
    }

    pub fn record_window_switch(&self) -> bool {
        let now = self.inner.clock.now();
        let events = self.inner.lock_state().record_window_switch(now);
        self.publish(events)
    }

    fn publish(&self, events: Option<Vec<TrackerEvent>>) -> bool {
        match events {
            Some(events) => {
                self.inner.bus.dispatch_all(events);
                true
            }
            None => false,
        }
    }

    pub fn check_afk(&self) {
        self.inner.check_afk();
    }

    pub fn reset_afk(&self) {
        self.inner.reset_afk();
    }

    /// Samples every input channel once and re-checks AFK, for hosts that
    /// drive sampling from their own UI tick. Returns the number of
    /// activities recorded.
    pub fn poll_input_once(&self) -> Result<usize> {
        if !self.is_tracking() {
            return Ok(0);
        }
        self.inner.sampler.poll_once(self.inner.as_ref())
    }

    pub fn afk_state(&self) -> AfkState {
        self.inner.lock_state().afk_state()
    }

    pub fn last_activity_time(&self) -> DateTime<Utc> {
        self.inner.lock_state().last_activity()
    }

    pub fn current_focus_level(&self) -> FocusLevel {
        self.inner.lock_state().scorer().level()
    }

    pub fn focus_score(&self) -> f64 {
        self.inner.lock_state().scorer().score()
    }

    /// Most recent level transitions, oldest first.
    pub fn focus_level_history(&self) -> Vec<FocusLevel> {
        self.inner.lock_state().scorer().level_history()
    }

    pub fn current_metrics(&self) -> EfficiencyMetrics {
        self.inner.lock_state().aggregator().current()
    }

    pub fn session_metrics(&self) -> EfficiencyMetrics {
        self.inner.lock_state().aggregator().session()
    }

    pub fn daily_metrics(&self) -> EfficiencyMetrics {
        let now = self.inner.clock.now();
        self.inner.lock_state().aggregator_mut().refresh_daily(now)
    }

    /// Report over the trailing `lookback` window ending now.
    pub fn generate_report(&self, lookback: Duration) -> EfficiencyReport {
        let now = self.inner.clock.now();
        self.generate_report_for(TimeRange::last(lookback, now))
    }

    pub fn generate_report_for(&self, range: TimeRange) -> EfficiencyReport {
        let now = self.inner.clock.now();
        self.inner.lock_state().aggregator().report(range, now)
    }

    pub fn data_point_count(&self) -> usize {
        self.inner.lock_state().aggregator().len()
    }

    pub fn activity_counts(&self) -> BTreeMap<ActivityKind, u64> {
        self.inner.lock_state().activity_counts()
    }

    pub fn counts_reset_at(&self) -> DateTime<Utc> {
        self.inner.lock_state().counts_reset_at()
    }

    pub fn reset_activity_counts(&self) {
        let now = self.inner.clock.now();
        self.inner.lock_state().reset_activity_counts(now);
    }

    pub fn clear_data(&self) {
        self.inner.lock_state().clear_data();
        info!("activity data cleared");
    }

    pub fn start_session(&self) {
        let now = self.inner.clock.now();
        self.inner.lock_state().start_session(now);
        info!("efficiency session started");
    }

    /// Closes the current session and returns its metrics, scored on the
    /// average focus over the session.
    pub fn end_session(&self) -> EfficiencyMetrics {
        let now = self.inner.clock.now();
        let (metrics, event) = self.inner.lock_state().end_session(now);
        info!(
            "efficiency session ended: efficiency {:.1}, {} activities, {} distractions",
            metrics.efficiency_score, metrics.activity_count, metrics.distraction_count
        );
        self.inner.bus.dispatch(event);
        metrics
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TrackerEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    pub fn events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.bus.receiver()
    }

    pub fn diagnostics(&self) -> TrackerDiagnostics {
        let loops = self.inner.lock_sensing().health().snapshot();
        let (tracking, data_points, afk) = {
            let state = self.inner.lock_state();
            (state.is_tracking(), state.aggregator().len(), state.afk_state())
        };
        let system = self
            .inner
            .process
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .sample();

        TrackerDiagnostics {
            sampled_at: self.inner.clock.now(),
            tracking,
            loops,
            data_points,
            afk,
            system,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sensing::{LoopStatus, PointerPosition};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct QuietProbe {
        typing: AtomicBool,
    }

    impl InputProbe for QuietProbe {
        fn pointer_position(&self) -> Result<PointerPosition> {
            Ok(PointerPosition::new(0.0, 0.0))
        }

        fn any_key_down(&self) -> Result<bool> {
            Ok(self.typing.load(Ordering::SeqCst))
        }

        fn take_scroll_delta(&self) -> Result<i64> {
            Ok(0)
        }
    }

    fn tracker() -> (ActivityTracker, ManualClock, Arc<QuietProbe>) {
        let clock = ManualClock::default();
        let probe = Arc::new(QuietProbe::default());
        let tracker =
            ActivityTracker::new(TrackerConfig::default(), probe.clone(), Arc::new(clock.clone()))
                .unwrap();
        (tracker, clock, probe)
    }

    #[test]
    fn test_start_requires_runtime() {
        let (tracker, _, _) = tracker();
        assert!(tracker.start_tracking().is_err());
        assert!(!tracker.is_tracking());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_from_thread_outside_runtime() {
        let (tracker, _, _) = tracker();
        let starter = tracker.clone();
        let started = std::thread::spawn(move || starter.start_tracking())
            .join()
            .unwrap();

        assert!(started.is_ok());
        assert!(tracker.is_tracking());
        tracker.stop_tracking().await.unwrap();
        assert!(!tracker.is_tracking());
    }

    #[test]
    fn test_attached_runtime_runs_the_loops() {
        let (tracker, _, _) = tracker();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        tracker.attach_runtime(runtime.handle().clone());

        tracker.start_tracking().unwrap();
        assert!(tracker.is_tracking());
        runtime.block_on(tracker.stop_tracking()).unwrap();
        assert!(tracker
            .diagnostics()
            .loops
            .iter()
            .all(|health| health.status == LoopStatus::Stopped));
    }

    #[tokio::test]
    async fn test_start_replaces_leftover_loops() {
        let (tracker, _, _) = tracker();
        tracker.start_tracking().unwrap();
        // Recording off but loops not yet collected, as midway through a stop.
        tracker.inner.lock_state().end_tracking();

        tracker.start_tracking().unwrap();
        assert!(tracker.is_tracking());
        tracker.stop_tracking().await.unwrap();
        assert!(!tracker.is_tracking());
        assert!(!tracker.inner.lock_sensing().is_active());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = TrackerConfig {
            sample_interval_ms: 0,
            ..TrackerConfig::default()
        };
        let probe: Arc<dyn InputProbe> = Arc::new(QuietProbe::default());
        assert!(ActivityTracker::with_system_clock(config, probe).is_err());
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_halts_loops() {
        let (tracker, _, _) = tracker();
        tracker.start_tracking().unwrap();
        tracker.start_tracking().unwrap();
        assert!(tracker.is_tracking());
        assert!(tracker
            .diagnostics()
            .loops
            .iter()
            .all(|health| health.status != LoopStatus::Terminated));

        tracker.stop_tracking().await.unwrap();
        assert!(!tracker.is_tracking());
        assert!(tracker
            .diagnostics()
            .loops
            .iter()
            .all(|health| health.status == LoopStatus::Stopped));

        tracker.stop_tracking().await.unwrap();
    }

    #[tokio::test]
    async fn test_poll_input_once_records_key_press() {
        let (tracker, clock, probe) = tracker();
        tracker.start_tracking().unwrap();
        clock.advance_secs(1);
        probe.typing.store(true, Ordering::SeqCst);

        // Loops have not been polled yet on this single-threaded runtime.
        assert_eq!(tracker.poll_input_once().unwrap(), 1);
        assert_eq!(tracker.activity_counts().get(&ActivityKind::KeyPress), Some(&1));
        tracker.stop_tracking().await.unwrap();
        assert_eq!(tracker.poll_input_once().unwrap(), 0);
    }

    #[test]
    fn test_end_session_emits_update() {
        let (tracker, clock, _) = tracker();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tracker.subscribe(move |event| sink.lock().unwrap().push(event.name()));

        clock.advance_secs(10);
        let metrics = tracker.end_session();
        assert_eq!(metrics.session_duration_ms, 10_000);
        assert_eq!(tracker.session_metrics(), metrics);
        assert_eq!(*seen.lock().unwrap(), vec!["efficiency-updated"]);
    }
}
