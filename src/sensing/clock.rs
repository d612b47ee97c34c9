use chrono::{DateTime, Utc};

/// Wall-clock source. Session bounds and elapsed time are always taken from
/// the same clock so they agree with each other.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
