pub mod afk;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod events;
pub mod focus;
pub mod metrics;
pub mod models;
pub mod sensing;
pub mod session;
pub mod tracker;

pub use afk::AfkState;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use diagnostics::{SystemMetrics, TrackerDiagnostics};
pub use events::{EventBus, SubscriptionId, TrackerEvent};
pub use metrics::{EfficiencyMetrics, EfficiencyReport, TimeRange};
pub use models::{ActivityDataPoint, ActivityKind, FocusLevel, SessionKind, SessionRecord};
pub use sensing::{InputProbe, SimulatedProbe, SimulatedProfile};
#[cfg(feature = "rdev-probe")]
pub use sensing::RdevProbe;
pub use session::{EfficiencyStatistics, JsonSessionStore, SessionStore};
pub use tracker::ActivityTracker;

/// True when `LEFOCUS_DEBUG` is `1` or `true`.
pub fn debug_mode() -> bool {
    std::env::var("LEFOCUS_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Installs the `env_logger` backend at `Info` (`Debug` in debug mode).
/// `RUST_LOG` still takes precedence. Safe to call more than once.
pub fn init_logging() {
    let level = if debug_mode() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
