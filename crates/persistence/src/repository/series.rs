//! Series repository: daily observations keyed by (source, symbol, date)

use crate::{DbError, DbResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single stored observation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ObservationRecord {
    pub id: Option<i64>,
    pub source: String,
    pub symbol: String,
    pub date: String,
    pub value: f64,
}

impl ObservationRecord {
    pub fn new(source: &str, symbol: &str, date: NaiveDate, value: f64) -> Self {
        Self {
            id: None,
            source: source.to_string(),
            symbol: symbol.to_string(),
            date: date.format(DATE_FORMAT).to_string(),
            value,
        }
    }

    /// Parse the stored date column
    pub fn parsed_date(&self) -> DbResult<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT)
            .map_err(|e| DbError::Query(format!("invalid date '{}': {e}", self.date)))
    }
}

/// Per-source metadata for one day
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SnapshotRecord {
    pub source: String,
    pub date: String,
    pub total_value: Option<f64>,
    pub asset_count: Option<i64>,
}

/// Summary of a stored source
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SourceSummary {
    pub source: String,
    pub symbols: i64,
    pub first_date: String,
    pub last_date: String,
}

/// Repository for daily observations and source snapshots
pub struct SeriesRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SeriesRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update observations (upsert by source, symbol, date).
    /// Returns the number of rows written.
    pub async fn upsert_observations(&self, records: &[ObservationRecord]) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0usize;
        for record in records {
            let result = sqlx::query(
                r#"INSERT INTO observations (source, symbol, date, value)
                   VALUES (?1, ?2, ?3, ?4)
                   ON CONFLICT(source, symbol, date) DO UPDATE SET
                     value = excluded.value,
                     updated_at = strftime('%s', 'now')
                "#,
            )
            .bind(&record.source)
            .bind(&record.symbol)
            .bind(&record.date)
            .bind(record.value)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(written)
    }

    /// All observations of a source, ordered by symbol then date ascending
    pub async fn load_observations(&self, source: &str) -> DbResult<Vec<ObservationRecord>> {
        let records = sqlx::query_as::<_, ObservationRecord>(
            r#"SELECT id, source, symbol, date, value FROM observations
               WHERE source = ?1
               ORDER BY symbol ASC, date ASC"#,
        )
        .bind(source)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Observations of one symbol, date ascending
    pub async fn load_symbol(&self, source: &str, symbol: &str) -> DbResult<Vec<ObservationRecord>> {
        let records = sqlx::query_as::<_, ObservationRecord>(
            r#"SELECT id, source, symbol, date, value FROM observations
               WHERE source = ?1 AND symbol = ?2
               ORDER BY date ASC"#,
        )
        .bind(source)
        .bind(symbol)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Distinct symbols stored for a source, alphabetical
    pub async fn list_symbols(&self, source: &str) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT symbol FROM observations WHERE source = ?1 ORDER BY symbol ASC",
        )
        .bind(source)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    /// All sources with their symbol count and date range
    pub async fn list_sources(&self) -> DbResult<Vec<SourceSummary>> {
        let summaries = sqlx::query_as::<_, SourceSummary>(
            r#"SELECT source,
                      COUNT(DISTINCT symbol) AS symbols,
                      MIN(date) AS first_date,
                      MAX(date) AS last_date
               FROM observations
               GROUP BY source
               ORDER BY source ASC"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(summaries)
    }

    /// Whether any observation exists for the source on the given date
    pub async fn has_date(&self, source: &str, date: NaiveDate) -> DbResult<bool> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM observations WHERE source = ?1 AND date = ?2")
                .bind(source)
                .bind(date.format(DATE_FORMAT).to_string())
                .fetch_one(self.pool)
                .await?;

        Ok(row.0 > 0)
    }

    /// Insert or update the daily snapshot of a source
    pub async fn save_snapshot(
        &self,
        source: &str,
        date: NaiveDate,
        total_value: Option<f64>,
        asset_count: i64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO source_snapshots (source, date, total_value, asset_count)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(source, date) DO UPDATE SET
                 total_value = excluded.total_value,
                 asset_count = excluded.asset_count
            "#,
        )
        .bind(source)
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(total_value)
        .bind(asset_count)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Most recent snapshot of a source
    pub async fn latest_snapshot(&self, source: &str) -> DbResult<Option<SnapshotRecord>> {
        let record = sqlx::query_as::<_, SnapshotRecord>(
            r#"SELECT source, date, total_value, asset_count FROM source_snapshots
               WHERE source = ?1
               ORDER BY date DESC
               LIMIT 1"#,
        )
        .bind(source)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_replaces_value_for_same_day() {
        let db = Database::in_memory().await.unwrap();
        let repo = SeriesRepository::new(db.pool());

        repo.upsert_observations(&[
            ObservationRecord::new("blackrock", "ETH", day(1), 10.0),
            ObservationRecord::new("blackrock", "ETH", day(2), 12.0),
        ])
        .await
        .unwrap();
        repo.upsert_observations(&[ObservationRecord::new("blackrock", "ETH", day(2), 15.0)])
            .await
            .unwrap();

        let rows = repo.load_symbol("blackrock", "ETH").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2025-03-01");
        assert_eq!(rows[1].value, 15.0);
        assert_eq!(rows[1].parsed_date().unwrap(), day(2));
    }

    #[tokio::test]
    async fn test_load_orders_by_symbol_then_date() {
        let db = Database::in_memory().await.unwrap();
        let repo = SeriesRepository::new(db.pool());

        repo.upsert_observations(&[
            ObservationRecord::new("fidelity", "WBTC", day(2), 2.0),
            ObservationRecord::new("fidelity", "ETH", day(2), 4.0),
            ObservationRecord::new("fidelity", "ETH", day(1), 3.0),
            ObservationRecord::new("other", "ETH", day(1), 99.0),
        ])
        .await
        .unwrap();

        let rows = repo.load_observations("fidelity").await.unwrap();
        let keys: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.symbol.as_str(), r.date.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("ETH", "2025-03-01"), ("ETH", "2025-03-02"), ("WBTC", "2025-03-02")]
        );
        assert_eq!(repo.list_symbols("fidelity").await.unwrap(), vec!["ETH", "WBTC"]);
        assert!(repo.has_date("fidelity", day(2)).await.unwrap());
        assert!(!repo.has_date("fidelity", day(3)).await.unwrap());

        let sources = repo.list_sources().await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source, "fidelity");
        assert_eq!(sources[0].symbols, 2);
        assert_eq!(sources[0].last_date, "2025-03-02");
    }

    #[tokio::test]
    async fn test_latest_snapshot() {
        let db = Database::in_memory().await.unwrap();
        let repo = SeriesRepository::new(db.pool());

        assert!(repo.latest_snapshot("usg").await.unwrap().is_none());
        repo.save_snapshot("usg", day(1), Some(1_000.0), 3).await.unwrap();
        repo.save_snapshot("usg", day(2), Some(1_250.5), 4).await.unwrap();

        let latest = repo.latest_snapshot("usg").await.unwrap().unwrap();
        assert_eq!(latest.date, "2025-03-02");
        assert_eq!(latest.total_value, Some(1_250.5));
        assert_eq!(latest.asset_count, Some(4));
    }
}
