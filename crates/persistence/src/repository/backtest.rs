//! Outlier backtest repository: results of window/multiplier grid searches

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted backtest run
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutlierBacktestRecord {
    pub id: Option<i64>,
    pub params_hash: String,
    pub source: String,
    pub symbol: String,
    pub price_symbol: String,
    pub window_size: i64,
    pub std_multiplier: f64,
    pub side: Option<String>,
    pub best_horizon: Option<i64>,
    pub best_ev: Option<f64>,
    pub event_count: i64,
    pub report_json: String,
}

/// Repository for outlier backtest results
pub struct BacktestRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BacktestRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Save a run (INSERT OR IGNORE: skips if params_hash already exists).
    /// Returns true when a new row was written.
    pub async fn save(&self, record: &OutlierBacktestRecord) -> DbResult<bool> {
        let result = sqlx::query(
            r#"INSERT OR IGNORE INTO outlier_backtests
                (params_hash, source, symbol, price_symbol, window_size, std_multiplier,
                 side, best_horizon, best_ev, event_count, report_json)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&record.params_hash)
        .bind(&record.source)
        .bind(&record.symbol)
        .bind(&record.price_symbol)
        .bind(record.window_size)
        .bind(record.std_multiplier)
        .bind(&record.side)
        .bind(record.best_horizon)
        .bind(record.best_ev)
        .bind(record.event_count)
        .bind(&record.report_json)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check if a run with this params_hash already exists
    pub async fn exists_by_hash(&self, hash: &str) -> DbResult<bool> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM outlier_backtests WHERE params_hash = ?1")
                .bind(hash)
                .fetch_one(self.pool)
                .await?;

        Ok(row.0 > 0)
    }

    /// Best runs by expected value, runs without an EV last
    pub async fn top_runs(&self, limit: i64) -> DbResult<Vec<OutlierBacktestRecord>> {
        let records = sqlx::query_as::<_, OutlierBacktestRecord>(
            r#"SELECT id, params_hash, source, symbol, price_symbol, window_size, std_multiplier,
                      side, best_horizon, best_ev, event_count, report_json
               FROM outlier_backtests
               ORDER BY best_ev IS NULL, best_ev DESC
               LIMIT ?1"#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }
}
