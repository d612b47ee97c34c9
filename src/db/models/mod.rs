pub mod session;

pub use session::{AppUsageSummary, TrackedSession};
