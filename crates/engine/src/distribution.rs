//! Bitcoin address distribution history
//!
//! The bitinfocharts distribution page embeds its chart data as a JavaScript
//! literal handed to Dygraph:
//! `[[new Date("2010/07/17"),v1,...,v8],[new Date(...),...]]`
//! with one balance column per address-size range.

use std::ops::Range;

use chrono::NaiveDate;
use thiserror::Error;

use crate::series::{Series, SymbolSeries};

/// Address ranges in the order the page lists them
pub const RAW_RANGES: [&str; 8] = [
    "0 - 0.1 BTC",
    "0.1 - 1 BTC",
    "1 - 10 BTC",
    "10 - 100 BTC",
    "100 - 1,000 BTC",
    "1,000 - 10,000 BTC",
    "10,000 - 100,000 BTC",
    "100,000 - 1,000,000 BTC",
];

/// Report buckets and the raw columns summed into each
pub const BUCKETS: [(&str, Range<usize>); 4] = [
    ("0.001 - 1 BTC", 0..2),
    ("1 - 10 BTC", 2..3),
    ("10 - 100 BTC", 3..4),
    ("100+ BTC", 4..8),
];

/// Source key under which bucket balances are stored
pub const DISTRIBUTION_SOURCE: &str = "distribution";

const LITERAL_START: &str = "[[new Date(";
const LITERAL_END: &str = "]]";

#[derive(Error, Debug, PartialEq)]
pub enum DistributionParseError {
    #[error("Chart data literal not found in page")]
    MissingData,

    #[error("Invalid date '{0}'")]
    InvalidDate(String),

    #[error("Row {row}: expected {expected} values, found {found}")]
    ColumnCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Row {row}: invalid value '{value}'")]
    InvalidValue { row: usize, value: String },
}

/// Balances of all raw ranges on one day
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionRow {
    pub date: NaiveDate,
    pub balances: [f64; 8],
}

impl DistributionRow {
    /// Bucket label and summed balance, in bucket order
    pub fn bucketed(&self) -> Vec<(&'static str, f64)> {
        BUCKETS
            .iter()
            .map(|(label, range)| (*label, self.balances[range.clone()].iter().sum()))
            .collect()
    }
}

/// Extract all dated rows from the page, oldest first
pub fn parse_distribution_history(html: &str) -> Result<Vec<DistributionRow>, DistributionParseError> {
    let start = html
        .find(LITERAL_START)
        .ok_or(DistributionParseError::MissingData)?;
    let body = &html[start + 2..];
    let end = body
        .find(LITERAL_END)
        .ok_or(DistributionParseError::MissingData)?;

    let mut rows = body[..end]
        .split("],[")
        .enumerate()
        .map(|(i, raw)| parse_row(i, raw))
        .collect::<Result<Vec<_>, _>>()?;

    rows.sort_by_key(|r| r.date);
    Ok(rows)
}

fn parse_row(index: usize, raw: &str) -> Result<DistributionRow, DistributionParseError> {
    let mut cells = raw.split(',');

    let date_cell = cells.next().unwrap_or_default();
    let date_text = date_cell
        .trim()
        .trim_start_matches("new Date(")
        .trim_end_matches(')')
        .trim_matches('"');
    let date = NaiveDate::parse_from_str(date_text, "%Y/%m/%d")
        .map_err(|_| DistributionParseError::InvalidDate(date_text.to_string()))?;

    let values: Vec<&str> = cells.map(str::trim).collect();
    if values.len() < RAW_RANGES.len() {
        return Err(DistributionParseError::ColumnCount {
            row: index,
            expected: RAW_RANGES.len(),
            found: values.len(),
        });
    }

    let mut balances = [0.0; 8];
    for (slot, value) in balances.iter_mut().zip(values.iter()) {
        *slot = match *value {
            "null" | "" => 0.0,
            v => v.parse().map_err(|_| DistributionParseError::InvalidValue {
                row: index,
                value: v.to_string(),
            })?,
        };
    }

    Ok(DistributionRow { date, balances })
}

/// One series per bucket, in bucket order
pub fn bucket_universe(rows: &[DistributionRow]) -> Vec<SymbolSeries> {
    let mut universe: Vec<SymbolSeries> = BUCKETS
        .iter()
        .map(|(label, _)| SymbolSeries::new(*label, Series::default()))
        .collect();

    for row in rows {
        for (entry, (_, value)) in universe.iter_mut().zip(row.bucketed()) {
            entry.series.push(row.date, value);
        }
    }
    universe
}
