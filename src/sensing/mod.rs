pub mod classify;
pub mod controller;
pub mod health;
pub mod loop_worker;
pub mod probe;
#[cfg(feature = "rdev-probe")]
pub mod rdev_probe;
pub mod sampler;

pub use classify::PointerPosition;
pub use controller::{RunningLoops, SensingController};
pub use health::{LoopChannel, LoopHealthBoard, LoopHealthSnapshot, LoopStatus};
pub use probe::{InputProbe, SimulatedProbe, SimulatedProfile};
#[cfg(feature = "rdev-probe")]
pub use rdev_probe::RdevProbe;
pub use sampler::Sampler;

use crate::models::ActivityKind;

/// Where the sampling loops deliver what they observe.
pub trait ActivitySink: Send + Sync + 'static {
    fn record_activity(&self, kind: ActivityKind, intensity: f64) -> bool;

    fn check_afk(&self);

    /// Safe-default recovery after a failed AFK check.
    fn reset_afk(&self);
}
