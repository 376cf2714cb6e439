pub mod statistics;
pub mod store;

pub use statistics::EfficiencyStatistics;
pub use store::{JsonSessionStore, SessionStore, DEFAULT_RETENTION_DAYS};
