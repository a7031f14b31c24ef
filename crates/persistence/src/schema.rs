//! Database schema definitions

/// SQL to create all tables
/// NOTE: dates are stored as ISO `YYYY-MM-DD` TEXT so that lexical order is date order
pub const CREATE_TABLES: &str = r#"
-- Daily observations, one row per (source, symbol, date)
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    value REAL NOT NULL,
    updated_at INTEGER DEFAULT (strftime('%s', 'now')),
    UNIQUE (source, symbol, date)
);

-- Per-source daily metadata (portfolio totals for whale entities)
CREATE TABLE IF NOT EXISTS source_snapshots (
    source TEXT NOT NULL,
    date TEXT NOT NULL,
    total_value REAL,
    asset_count INTEGER,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    PRIMARY KEY (source, date)
);

-- Outlier backtest grid results
CREATE TABLE IF NOT EXISTS outlier_backtests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    params_hash TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    symbol TEXT NOT NULL,
    price_symbol TEXT NOT NULL,
    window_size INTEGER NOT NULL,
    std_multiplier REAL NOT NULL,
    side TEXT,
    best_horizon INTEGER,
    best_ev REAL,
    event_count INTEGER NOT NULL DEFAULT 0,
    report_json TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_observations_source ON observations(source, date);
CREATE INDEX IF NOT EXISTS idx_backtests_ev ON outlier_backtests(best_ev DESC)
"#;
