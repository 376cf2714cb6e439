pub mod activity;
pub mod session;

pub use activity::{ActivityDataPoint, ActivityKind, FocusLevel};
pub use session::{SessionKind, SessionRecord};
