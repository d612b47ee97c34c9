use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{
    helpers::{format_datetime, parse_datetime, to_i64, to_u64},
    models::{AppUsageSummary, TrackedSession},
    Database,
};

fn row_to_session(row: &Row) -> Result<TrackedSession> {
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;
    let duration_ms: i64 = row.get("duration_ms")?;

    Ok(TrackedSession {
        id: row.get("id")?,
        package_id: row.get("package_id")?,
        label: row.get("label")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_datetime(&end_time, "end_time")?,
        duration_ms: to_u64(duration_ms, "duration_ms")?,
        date: row.get("date")?,
    })
}

impl Database {
    pub async fn insert_tracked_session(&self, session: &TrackedSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO usage_sessions (id, package_id, label, start_time, end_time, duration_ms, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.package_id,
                    record.label,
                    format_datetime(&record.start_time),
                    format_datetime(&record.end_time),
                    to_i64(record.duration_ms)?,
                    record.date,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Sessions whose `date` falls in `[start_date, end_date]` (inclusive,
    /// `yyyy-MM-dd`), newest first.
    pub async fn query_sessions_by_date_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<TrackedSession>> {
        let start_date = start_date.to_string();
        let end_date = end_date.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, package_id, label, start_time, end_time, duration_ms, date
                 FROM usage_sessions
                 WHERE date BETWEEN ?1 AND ?2
                 ORDER BY start_time DESC",
            )?;

            let mut rows = stmt.query(params![start_date, end_date])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    /// Per-package totals for `[start_date, end_date]`, largest total first.
    /// The label reported is the most recent one stored for the package.
    pub async fn aggregate_by_package(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<AppUsageSummary>> {
        let start_date = start_date.to_string();
        let end_date = end_date.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.package_id,
                        (SELECT l.label FROM usage_sessions l
                          WHERE l.package_id = s.package_id
                            AND l.date BETWEEN ?1 AND ?2
                          ORDER BY l.start_time DESC LIMIT 1) AS label,
                        SUM(s.duration_ms) AS total_duration_ms,
                        COUNT(*) AS session_count
                 FROM usage_sessions s
                 WHERE s.date BETWEEN ?1 AND ?2
                 GROUP BY s.package_id
                 ORDER BY total_duration_ms DESC, s.package_id ASC",
            )?;

            let mut rows = stmt.query(params![start_date, end_date])?;
            let mut summaries = Vec::new();
            while let Some(row) = rows.next()? {
                let total: i64 = row.get("total_duration_ms")?;
                let count: i64 = row.get("session_count")?;
                summaries.push(AppUsageSummary {
                    package_id: row.get("package_id")?,
                    label: row.get("label")?,
                    total_duration_ms: to_u64(total, "total_duration_ms")?,
                    session_count: u32::try_from(count)?,
                });
            }
            Ok(summaries)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};

    fn setup() -> (Database, TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("test.sqlite3")).unwrap();
        (db, dir)
    }

    fn session(package: &str, label: &str, start_secs: i64, secs: i64, date: &str) -> TrackedSession {
        let start = Utc.timestamp_opt(start_secs, 0).unwrap();
        TrackedSession::close(
            package.into(),
            label.into(),
            start,
            start + Duration::seconds(secs),
            date.into(),
        )
    }

    #[tokio::test]
    async fn date_range_is_inclusive_and_newest_first() {
        let (db, _dir) = setup();
        db.insert_tracked_session(&session("com.a", "A", 100, 10, "2024-05-01")).await.unwrap();
        db.insert_tracked_session(&session("com.a", "A", 200, 10, "2024-05-02")).await.unwrap();
        db.insert_tracked_session(&session("com.b", "B", 300, 10, "2024-05-03")).await.unwrap();
        db.insert_tracked_session(&session("com.b", "B", 400, 10, "2024-05-04")).await.unwrap();

        let found = db
            .query_sessions_by_date_range("2024-05-02", "2024-05-03")
            .await
            .unwrap();
        let dates: Vec<_> = found.iter().map(|s| s.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-05-03", "2024-05-02"]);
    }

    #[tokio::test]
    async fn stored_session_reads_back_intact() {
        let (db, _dir) = setup();
        let original = session("com.a", "App A", 1_700_000_000, 42, "2023-11-14");
        db.insert_tracked_session(&original).await.unwrap();

        let found = db
            .query_sessions_by_date_range("2023-11-14", "2023-11-14")
            .await
            .unwrap();
        assert_eq!(found, vec![original]);
    }

    #[tokio::test]
    async fn aggregate_orders_by_total_duration() {
        let (db, _dir) = setup();
        db.insert_tracked_session(&session("com.a", "A", 100, 30, "2024-05-01")).await.unwrap();
        db.insert_tracked_session(&session("com.b", "B", 200, 50, "2024-05-01")).await.unwrap();
        db.insert_tracked_session(&session("com.a", "A", 300, 40, "2024-05-02")).await.unwrap();
        db.insert_tracked_session(&session("com.c", "C", 400, 999, "2024-06-01")).await.unwrap();

        let summary = db.aggregate_by_package("2024-05-01", "2024-05-31").await.unwrap();
        assert_eq!(
            summary,
            vec![
                AppUsageSummary {
                    package_id: "com.a".into(),
                    label: "A".into(),
                    total_duration_ms: 70_000,
                    session_count: 2,
                },
                AppUsageSummary {
                    package_id: "com.b".into(),
                    label: "B".into(),
                    total_duration_ms: 50_000,
                    session_count: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn aggregate_uses_latest_label() {
        let (db, _dir) = setup();
        db.insert_tracked_session(&session("com.a", "com.a", 100, 5, "2024-05-01")).await.unwrap();
        db.insert_tracked_session(&session("com.a", "Renamed", 200, 5, "2024-05-01")).await.unwrap();

        let summary = db.aggregate_by_package("2024-05-01", "2024-05-01").await.unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].label, "Renamed");
    }
}
