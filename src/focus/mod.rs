pub mod scorer;
pub mod scoring;

pub use scorer::{FocusScorer, FocusUpdate};
