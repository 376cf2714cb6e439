use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::broadcast::error::RecvError;

use lefocus_tracker::{
    init_logging,
    session::DEFAULT_RETENTION_DAYS,
    ActivityTracker, InputProbe, JsonSessionStore, SessionKind, SessionRecord, SessionStore,
    SimulatedProbe, SimulatedProfile, TrackerConfig, TrackerEvent,
};

const DEFAULT_RUN_SECS: u64 = 30;
const DEFAULT_STORE_PATH: &str = "sessions.json";

fn load_config() -> Result<TrackerConfig> {
    match env::var("LEFOCUS_TRACKER_CONFIG") {
        Ok(path) => TrackerConfig::load(&PathBuf::from(path)),
        Err(_) => Ok(TrackerConfig::default()),
    }
}

fn select_probe() -> Result<Arc<dyn InputProbe>> {
    let choice = env::var("LEFOCUS_PROBE").unwrap_or_else(|_| "simulated".into());
    match choice.as_str() {
        "simulated" => Ok(Arc::new(SimulatedProbe::new(SimulatedProfile::default()))),
        #[cfg(feature = "rdev-probe")]
        "rdev" => Ok(Arc::new(lefocus_tracker::RdevProbe::spawn()?)),
        #[cfg(not(feature = "rdev-probe"))]
        "rdev" => bail!("built without the rdev-probe feature"),
        other => bail!("unknown probe '{other}', expected simulated or rdev"),
    }
}

fn run_duration() -> Result<Duration> {
    match env::var("LEFOCUS_RUN_SECS") {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("LEFOCUS_RUN_SECS must be a number, got '{raw}'"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(DEFAULT_RUN_SECS)),
    }
}

fn log_event(event: &TrackerEvent) {
    match event {
        TrackerEvent::ActivityDetected { kind, intensity, .. } => {
            debug!("activity: {} ({intensity:.2})", kind.as_str());
        }
        TrackerEvent::AfkDetected { duration_ms, .. } => {
            info!("AFK after {}s of silence", duration_ms / 1000);
        }
        TrackerEvent::FocusLost { .. } => info!("focus lost"),
        TrackerEvent::EfficiencyUpdated { metrics } => {
            debug!(
                "efficiency {:.1}, focus {:.1}, active {:.0}%",
                metrics.efficiency_score, metrics.focus_score, metrics.active_percentage
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = load_config()?;
    let probe = select_probe()?;
    let run_for = run_duration()?;
    let store_path = env::var("LEFOCUS_SESSION_STORE").unwrap_or_else(|_| DEFAULT_STORE_PATH.into());

    let store = JsonSessionStore::open(&store_path)?;
    let pruned = store.prune_older_than(DEFAULT_RETENTION_DAYS, Utc::now())?;
    if pruned > 0 {
        info!("pruned {pruned} sessions older than {DEFAULT_RETENTION_DAYS} days");
    }

    let tracker = ActivityTracker::with_system_clock(config, probe)?;
    let mut events = tracker.events();
    let event_logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!("event log skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let started_at = Utc::now();
    tracker.start_tracking()?;
    info!("tracking for {}s (Ctrl-C to finish early)", run_for.as_secs());

    tokio::select! {
        _ = tokio::time::sleep(run_for) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!("failed to listen for Ctrl-C: {err}");
            }
        }
    }

    let metrics = tracker.end_session();
    if let Err(err) = tracker.stop_tracking().await {
        warn!("{err:#}");
    }
    event_logger.abort();

    let ended_at = Utc::now();
    store.save(SessionRecord::new(SessionKind::Work, started_at, ended_at, metrics))?;

    let report = tracker.generate_report(ended_at - started_at);
    println!("{}", serde_json::to_string_pretty(&report)?);

    let stats = store.statistics(chrono::Duration::days(7), ended_at)?;
    println!(
        "last 7 days: {} sessions, average efficiency {:.1}, average focus {:.1}",
        stats.total_sessions, stats.average_efficiency_score, stats.average_focus_score
    );

    let diagnostics = tracker.diagnostics();
    debug!("{}", serde_json::to_string_pretty(&diagnostics)?);
    Ok(())
}
