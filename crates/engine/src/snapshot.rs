//! Whale holdings snapshots and the tracked entity universe
//!
//! Holdings are collected out of band (the portfolio pages need a browser) and
//! handed over as one JSON document per entity and day:
//!
//! ```json
//! { "source": "blackrock", "date": "2025-03-01", "total_value": "$52.1B",
//!   "holdings": { "ETH": "1.2M", "WBTC": 12.5 } }
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// An amount as it appears on a portfolio page, or already numeric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    pub fn resolve(&self) -> Result<f64, SnapshotError> {
        match self {
            RawAmount::Number(n) => Ok(*n),
            RawAmount::Text(s) => parse_amount(s),
        }
    }
}

/// Parse `"1,234.5"`, `"$52.1B"`, `"12K"` style amounts.
/// Accounting negatives such as `"(12.3)"` parse as `-12.3`.
pub fn parse_amount(raw: &str) -> Result<f64, SnapshotError> {
    let trimmed = raw.trim();
    let (trimmed, sign) = match trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (inner, -1.0),
        None => (trimmed, 1.0),
    };
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' '))
        .collect();

    let (number, scale) = match cleaned.chars().last() {
        Some('B') | Some('b') => (&cleaned[..cleaned.len() - 1], 1_000_000_000.0),
        Some('M') | Some('m') => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        Some('K') | Some('k') => (&cleaned[..cleaned.len() - 1], 1_000.0),
        _ => (cleaned.as_str(), 1.0),
    };

    number
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| sign * v * scale)
        .ok_or_else(|| SnapshotError::InvalidAmount(raw.to_string()))
}

/// One entity's holdings on one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingsSnapshot {
    pub source: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub total_value: Option<RawAmount>,
    pub holdings: BTreeMap<String, RawAmount>,
}

/// Holdings with amounts resolved; unparseable rows are listed separately
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedHoldings {
    pub amounts: Vec<(String, f64)>,
    pub skipped: Vec<String>,
}

impl HoldingsSnapshot {
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn resolve(&self) -> ResolvedHoldings {
        let mut resolved = ResolvedHoldings::default();
        for (symbol, amount) in &self.holdings {
            match amount.resolve() {
                Ok(value) => resolved.amounts.push((symbol.clone(), value)),
                Err(_) => resolved.skipped.push(symbol.clone()),
            }
        }
        resolved
    }

    pub fn total(&self) -> Option<f64> {
        self.total_value.as_ref().and_then(|v| v.resolve().ok())
    }
}

/// An entity whose holdings are tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    /// Storage source key
    pub key: String,
    pub title: String,
    pub category: String,
}

impl TrackedEntity {
    pub fn new(key: &str, title: &str, category: &str) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            category: category.to_string(),
        }
    }
}

/// ETFs, exchanges and companies in report order
pub fn default_entities() -> Vec<TrackedEntity> {
    vec![
        TrackedEntity::new("blackrock", "BlackRock", "ETFs"),
        TrackedEntity::new("fidelity", "Fidelity", "ETFs"),
        TrackedEntity::new("grayscale", "Grayscale", "ETFs"),
        TrackedEntity::new("ark", "ARK Invest", "ETFs"),
        TrackedEntity::new("bitwise", "Bitwise", "ETFs"),
        TrackedEntity::new("binance", "Binance", "CEX"),
        TrackedEntity::new("coinbase", "Coinbase", "CEX"),
        TrackedEntity::new("bitfinex", "Bitfinex", "CEX"),
        TrackedEntity::new("kraken", "Kraken", "CEX"),
        TrackedEntity::new("robinhood", "Robinhood", "CEX"),
        TrackedEntity::new("microstrategy", "MicroStrategy", "Companies"),
        TrackedEntity::new("worldliberty", "World Liberty Fi", "Companies"),
        TrackedEntity::new("usg", "US Government", "Companies"),
    ]
}
