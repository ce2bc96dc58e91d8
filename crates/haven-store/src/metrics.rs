use chrono::NaiveDate;
use rusqlite::params;

use crate::credential::parse_rfc3339;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::MetricRow;

const DATE_FMT: &str = "%Y-%m-%d";

impl Database {
    /// Insert or overwrite the metric for its date. At most one row per
    /// calendar date, enforced by the primary key.
    pub fn upsert_metric(&self, metric: &MetricRow) -> Result<()> {
        self.conn().execute(
            "INSERT INTO daily_metrics (date, payload, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(date) DO UPDATE SET payload = ?2, updated_at = ?3",
            params![
                metric.date.format(DATE_FMT).to_string(),
                metric.payload,
                metric.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_metric(&self, date: NaiveDate) -> Result<MetricRow> {
        self.conn()
            .query_row(
                "SELECT date, payload, updated_at FROM daily_metrics WHERE date = ?1",
                params![date.format(DATE_FMT).to_string()],
                row_to_metric,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All metrics with `date >= from`, oldest first.
    pub fn metrics_since(&self, from: NaiveDate) -> Result<Vec<MetricRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT date, payload, updated_at FROM daily_metrics
             WHERE date >= ?1 ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![from.format(DATE_FMT).to_string()], row_to_metric)?;
        collect_rows(rows)
    }

    /// The most recent `limit` metrics, newest first.
    pub fn recent_metrics(&self, limit: u32) -> Result<Vec<MetricRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT date, payload, updated_at FROM daily_metrics
             ORDER BY date DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], row_to_metric)?;
        collect_rows(rows)
    }

    pub fn all_metrics(&self) -> Result<Vec<MetricRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT date, payload, updated_at FROM daily_metrics ORDER BY date ASC",
        )?;
        let rows = stmt.query_map([], row_to_metric)?;
        collect_rows(rows)
    }
}

pub(crate) fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(crate) fn parse_date(value: &str, column: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_metric(row: &rusqlite::Row<'_>) -> rusqlite::Result<MetricRow> {
    let date_str: String = row.get(0)?;
    let payload: Vec<u8> = row.get(1)?;
    let updated_str: String = row.get(2)?;

    Ok(MetricRow {
        date: parse_date(&date_str, 0)?,
        payload,
        updated_at: parse_rfc3339(&updated_str, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metric(date: &str, payload: &[u8]) -> MetricRow {
        MetricRow {
            date: NaiveDate::parse_from_str(date, DATE_FMT).unwrap(),
            payload: payload.to_vec(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_overwrites_same_date() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_metric(&metric("2026-08-01", b"first")).unwrap();
        db.upsert_metric(&metric("2026-08-01", b"second")).unwrap();

        let all = db.all_metrics().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].payload, b"second");
    }

    #[test]
    fn metrics_since_filters_and_orders() {
        let db = Database::open_in_memory().unwrap();
        for date in ["2026-08-03", "2026-08-01", "2026-08-02"] {
            db.upsert_metric(&metric(date, date.as_bytes())).unwrap();
        }

        let from = NaiveDate::parse_from_str("2026-08-02", DATE_FMT).unwrap();
        let since = db.metrics_since(from).unwrap();
        assert_eq!(since.len(), 2);
        assert!(since[0].date < since[1].date);
    }

    #[test]
    fn recent_metrics_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for date in ["2026-08-01", "2026-08-02", "2026-08-03"] {
            db.upsert_metric(&metric(date, b"x")).unwrap();
        }

        let recent = db.recent_metrics(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].date > recent[1].date);
    }

    #[test]
    fn missing_metric_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let date = NaiveDate::parse_from_str("2026-08-01", DATE_FMT).unwrap();
        assert!(matches!(db.get_metric(date), Err(StoreError::NotFound)));
    }
}
