use chrono::{DateTime, Local, TimeZone, Utc};

/// Human readable total for usage tables: `"2h 5m"`, `"12m"` or `"40s"`.
pub fn format_duration(ms: i64) -> String {
    if ms < 0 {
        return "0s".to_string();
    }
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{seconds}s")
    }
}

/// Countdown-style `MM:SS` used by the floating pill. Minutes are not wrapped
/// into hours, so a long visit reads `125:03`.
pub fn format_timer(seconds: i64) -> String {
    if seconds < 0 {
        return "00:00".to_string();
    }
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn format_pill_text(label: &str, elapsed_secs: i64) -> String {
    format!("{label} \u{00B7} {}", format_timer(elapsed_secs))
}

/// Calendar day (`yyyy-MM-dd`) of `start` as seen from `tz`.
pub fn session_date<Tz: TimeZone>(start: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    start.with_timezone(tz).format("%Y-%m-%d").to_string()
}

pub fn local_session_date(start: DateTime<Utc>) -> String {
    session_date(start, &Local)
}
