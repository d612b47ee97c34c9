use std::fmt::Write as _;

use anyhow::Result;
use chrono::{Days, Local, NaiveDate};
use clap::ValueEnum;

use crate::db::{AppUsageSummary, Database};
use crate::utils::format_duration;

/// Reporting windows. Every range ends today and includes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DateRange {
    #[default]
    Today,
    ThreeDays,
    Week,
    Month,
}

impl DateRange {
    fn days_back(self) -> u64 {
        match self {
            DateRange::Today => 0,
            DateRange::ThreeDays => 2,
            DateRange::Week => 6,
            DateRange::Month => 29,
        }
    }

    /// `(start, end)` as `yyyy-MM-dd`, inclusive on both ends.
    pub fn bounds(self, today: NaiveDate) -> (String, String) {
        let start = today
            .checked_sub_days(Days::new(self.days_back()))
            .unwrap_or(NaiveDate::MIN);
        (
            start.format("%Y-%m-%d").to_string(),
            today.format("%Y-%m-%d").to_string(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    pub start_date: String,
    pub end_date: String,
    pub apps: Vec<AppUsageSummary>,
    pub total_duration_ms: u64,
}

impl UsageReport {
    pub fn new(start_date: String, end_date: String, apps: Vec<AppUsageSummary>) -> Self {
        let total_duration_ms = apps.iter().map(|app| app.total_duration_ms).sum();
        Self {
            start_date,
            end_date,
            apps,
            total_duration_ms,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Usage {} .. {}", self.start_date, self.end_date);
        if self.apps.is_empty() {
            let _ = writeln!(out, "  no sessions recorded");
            return out;
        }

        let width = self
            .apps
            .iter()
            .map(|app| app.label.chars().count())
            .max()
            .unwrap_or(0)
            .max(5);
        for app in &self.apps {
            let _ = writeln!(
                out,
                "  {:<width$}  {:>8}  {:>3} session{}",
                app.label,
                format_duration(app.total_duration_ms as i64),
                app.session_count,
                if app.session_count == 1 { "" } else { "s" },
            );
        }
        let _ = writeln!(
            out,
            "  {:<width$}  {:>8}",
            "Total",
            format_duration(self.total_duration_ms as i64)
        );
        out
    }
}

pub async fn usage_report(db: &Database, range: DateRange) -> Result<UsageReport> {
    let (start, end) = range.bounds(Local::now().date_naive());
    let apps = db.aggregate_by_package(&start, &end).await?;
    Ok(UsageReport::new(start, end, apps))
}
