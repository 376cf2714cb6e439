pub mod controller;
pub mod state;

pub use controller::ActivityTracker;
pub use state::RecorderState;
