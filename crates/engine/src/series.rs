//! Daily series and their day-over-day changes
//!
//! A `Series` is an ascending, date-unique snapshot handed over by the store.
//! Ordering and uniqueness are preconditions of the caller; nothing here
//! re-sorts or deduplicates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// Observations of a single symbol, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    points: Vec<Observation>,
}

impl Series {
    pub fn new(points: Vec<Observation>) -> Self {
        Self { points }
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self {
            points: pairs
                .into_iter()
                .map(|(date, value)| Observation { date, value })
                .collect(),
        }
    }

    /// Append the next day's observation
    pub fn push(&mut self, date: NaiveDate, value: f64) {
        self.points.push(Observation { date, value });
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&Observation> {
        self.points.last()
    }

    /// Value `n` observations before the newest (`0` is the newest)
    pub fn value_back(&self, n: usize) -> Option<f64> {
        let len = self.points.len();
        if n >= len {
            return None;
        }
        Some(self.points[len - 1 - n].value)
    }

    /// Copy without the newest `n` observations
    pub fn without_latest(&self, n: usize) -> Series {
        let keep = self.points.len().saturating_sub(n);
        Series {
            points: self.points[..keep].to_vec(),
        }
    }

    /// Copy of the newest `n` observations
    pub fn tail(&self, n: usize) -> Series {
        let skip = self.points.len().saturating_sub(n);
        Series {
            points: self.points[skip..].to_vec(),
        }
    }

    /// Index of the observation on `date`
    pub fn position_of(&self, date: NaiveDate) -> Option<usize> {
        self.points.binary_search_by(|p| p.date.cmp(&date)).ok()
    }
}

/// A series tagged with the symbol it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSeries {
    pub symbol: String,
    pub series: Series,
}

impl SymbolSeries {
    pub fn new(symbol: impl Into<String>, series: Series) -> Self {
        Self {
            symbol: symbol.into(),
            series,
        }
    }
}

/// Day-over-day changes derived from a `Series`, oldest first.
///
/// Each change is dated by the later of the two observations it compares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSeries {
    dates: Vec<NaiveDate>,
    deltas: Vec<f64>,
}

impl ChangeSeries {
    /// Absolute differences `value[i] - value[i-1]`
    pub fn diff(series: &Series) -> Self {
        let mut dates = Vec::with_capacity(series.len().saturating_sub(1));
        let mut deltas = Vec::with_capacity(series.len().saturating_sub(1));
        for pair in series.points().windows(2) {
            dates.push(pair[1].date);
            deltas.push(pair[1].value - pair[0].value);
        }
        Self { dates, deltas }
    }

    /// Percentage changes; steps from a zero value are skipped
    pub fn percent(series: &Series) -> Self {
        let mut dates = Vec::new();
        let mut deltas = Vec::new();
        for pair in series.points().windows(2) {
            let prev = pair[0].value;
            if prev == 0.0 {
                continue;
            }
            dates.push(pair[1].date);
            deltas.push((pair[1].value - prev) / prev * 100.0);
        }
        Self { dates, deltas }
    }

    /// Build directly from dated changes (oldest first)
    pub fn from_changes(dates: Vec<NaiveDate>, deltas: Vec<f64>) -> Self {
        debug_assert_eq!(dates.len(), deltas.len());
        Self { dates, deltas }
    }

    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}
