//! Completed dwell sessions and their per-app aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One contiguous foreground visit of a tracked package. Immutable once it
/// has been handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSession {
    pub id: String,
    pub package_id: String,
    pub label: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    /// Local calendar day of `start_time`, `yyyy-MM-dd`.
    pub date: String,
}

impl TrackedSession {
    /// Builds a session from its bounds. An `end` earlier than `start` is
    /// treated as zero duration.
    pub fn close(
        package_id: String,
        label: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        date: String,
    ) -> Self {
        let duration_ms = (end_time - start_time).num_milliseconds().max(0) as u64;
        Self {
            id: Uuid::new_v4().to_string(),
            package_id,
            label,
            start_time,
            end_time,
            duration_ms,
            date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUsageSummary {
    pub package_id: String,
    pub label: String,
    pub total_duration_ms: u64,
    pub session_count: u32,
}
