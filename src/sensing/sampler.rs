use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Source of foreground observations.
///
/// Returns the package most recently seen in the foreground within
/// `lookback` of `now`, or `None` when nothing was observed in that window.
/// `None` is a normal answer: the tracking state machine reads it as
/// "foreground unchanged".
pub trait ForegroundSampler: Send + Sync + 'static {
    fn most_recent_foreground(
        &self,
        now: DateTime<Utc>,
        lookback: Duration,
    ) -> Result<Option<String>>;
}

/// Last successful observation, used to answer within the lookback window
/// when the platform query itself comes back empty.
#[derive(Debug, Default)]
pub(crate) struct LastSeen {
    entry: Option<(String, DateTime<Utc>)>,
}

impl LastSeen {
    pub(crate) fn record(&mut self, package_id: &str, at: DateTime<Utc>) {
        self.entry = Some((package_id.to_string(), at));
    }

    pub(crate) fn within(&self, now: DateTime<Utc>, lookback: Duration) -> Option<String> {
        let (package_id, at) = self.entry.as_ref()?;
        let age = (now - *at).to_std().unwrap_or_default();
        (age <= lookback).then(|| package_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn last_seen_expires_after_lookback() {
        let t0 = Utc.timestamp_opt(1_000, 0).unwrap();
        let mut last = LastSeen::default();
        assert_eq!(last.within(t0, Duration::from_secs(5)), None);

        last.record("firefox", t0);
        assert_eq!(
            last.within(t0 + chrono::Duration::seconds(5), Duration::from_secs(5)),
            Some("firefox".to_string())
        );
        assert_eq!(
            last.within(t0 + chrono::Duration::seconds(6), Duration::from_secs(5)),
            None
        );
    }
}
