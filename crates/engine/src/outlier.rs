//! Sudden-change detection against a same-sign rolling baseline
//!
//! Positive and negative changes are baselined separately ("buying" against
//! past buying, "selling" against past selling). The tested change is never
//! part of its own baseline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::series::ChangeSeries;
use crate::types::{Direction, DirectionRule};

/// Rolling window parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierConfig {
    /// Trailing changes forming the baseline
    pub window_size: usize,
    /// Standard deviations above the mean a change must exceed
    pub std_multiplier: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            std_multiplier: 1.0,
        }
    }
}

/// Mean and spread of same-signed magnitudes in a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignBaseline {
    pub mean: f64,
    pub std_dev: f64,
    pub threshold: f64,
    pub samples: usize,
}

/// A change flagged as anomalous
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierResult {
    pub date: NaiveDate,
    /// Signed change as observed
    pub change: f64,
    pub direction: Direction,
    pub magnitude: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub threshold: f64,
}

/// Baseline over the magnitudes in `window` whose sign matches `direction`.
///
/// Fewer than two samples, or a zero/non-finite spread, leaves the threshold
/// undefined and yields `None`.
pub fn same_sign_baseline(
    window: &[f64],
    direction: Direction,
    std_multiplier: f64,
) -> Option<SignBaseline> {
    let magnitudes: Vec<f64> = window
        .iter()
        .filter_map(|&c| match direction {
            Direction::Increasing if c > 0.0 => Some(c),
            Direction::Decreasing if c < 0.0 => Some(-c),
            _ => None,
        })
        .collect();

    let n = magnitudes.len();
    if n < 2 {
        return None;
    }

    let mean = magnitudes.iter().sum::<f64>() / n as f64;
    let variance = magnitudes.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std_dev = variance.sqrt();
    if !std_dev.is_finite() || std_dev == 0.0 {
        return None;
    }

    Some(SignBaseline {
        mean,
        std_dev,
        threshold: mean + std_multiplier * std_dev,
        samples: n,
    })
}

/// Test the change at `idx` against the `window_size` changes before it
fn test_change_at(changes: &ChangeSeries, idx: usize, config: &OutlierConfig) -> Option<OutlierResult> {
    let deltas = changes.deltas();
    if config.window_size == 0 || idx < config.window_size || idx >= deltas.len() {
        return None;
    }

    let change = deltas[idx];
    let direction = DirectionRule::default().classify(change)?;
    let window = &deltas[idx - config.window_size..idx];
    let baseline = same_sign_baseline(window, direction, config.std_multiplier)?;

    let magnitude = change.abs();
    if magnitude <= baseline.threshold {
        return None;
    }

    Some(OutlierResult {
        date: changes.dates()[idx],
        change,
        direction,
        magnitude,
        mean: baseline.mean,
        std_dev: baseline.std_dev,
        threshold: baseline.threshold,
    })
}

/// Test only the newest change against the window preceding it
pub fn detect_sudden_change(changes: &ChangeSeries, config: &OutlierConfig) -> Option<OutlierResult> {
    let last = changes.len().checked_sub(1)?;
    test_change_at(changes, last, config)
}

/// Test every change that has a full window behind it.
///
/// Within one trailing window only the oldest flagged change is kept, so a
/// volatile stretch produces a single event.
pub fn scan_outliers(changes: &ChangeSeries, config: &OutlierConfig) -> Vec<OutlierResult> {
    let mut retained: Vec<(usize, OutlierResult)> = Vec::new();

    for idx in config.window_size..changes.len() {
        let Some(result) = test_change_at(changes, idx, config) else {
            continue;
        };
        let window_start = idx + 1 - config.window_size;
        let covered = retained
            .last()
            .is_some_and(|(prev_idx, _)| *prev_idx >= window_start);
        if !covered {
            retained.push((idx, result));
        }
    }

    retained.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(deltas: &[f64]) -> ChangeSeries {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let dates = (0..deltas.len())
            .map(|i| start + chrono::Duration::days(i as i64 + 1))
            .collect();
        ChangeSeries::from_changes(dates, deltas.to_vec())
    }

    fn ten_day_window() -> Vec<f64> {
        let mut w = vec![1.0; 9];
        w.push(10.0);
        w
    }

    #[test]
    fn test_baseline_sample_statistics() {
        let baseline = same_sign_baseline(&ten_day_window(), Direction::Increasing, 1.0).unwrap();
        assert!((baseline.mean - 1.9).abs() < 1e-9);
        assert!((baseline.std_dev - 8.1_f64.sqrt()).abs() < 1e-9);
        assert_eq!(baseline.samples, 10);
        assert!(baseline.threshold > 4.6 && baseline.threshold < 4.8);
    }

    #[test]
    fn test_large_candidate_is_flagged() {
        let config = OutlierConfig {
            window_size: 10,
            std_multiplier: 1.0,
        };
        let mut deltas = ten_day_window();
        deltas.push(10.0);
        let result = detect_sudden_change(&changes(&deltas), &config).unwrap();
        assert_eq!(result.direction, Direction::Increasing);
        assert_eq!(result.magnitude, 10.0);
        assert!((result.mean - 1.9).abs() < 1e-9);

        let mut deltas = ten_day_window();
        deltas.push(3.0);
        assert_eq!(detect_sudden_change(&changes(&deltas), &config), None);
    }

    #[test]
    fn test_selling_uses_negative_baseline() {
        let config = OutlierConfig {
            window_size: 6,
            std_multiplier: 2.0,
        };
        let deltas = [5.0, -1.0, 50.0, -2.0, -1.0, -2.0, -9.0];
        let result = detect_sudden_change(&changes(&deltas), &config).unwrap();
        assert_eq!(result.direction, Direction::Decreasing);
        assert_eq!(result.change, -9.0);
        assert_eq!(result.magnitude, 9.0);
        assert!((result.mean - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_sign_in_window_short_circuits() {
        let config = OutlierConfig {
            window_size: 4,
            std_multiplier: 1.0,
        };
        // No selling days in the window: a large sell cannot be judged
        let result = detect_sudden_change(&changes(&[1.0, 2.0, 3.0, 4.0, -100.0]), &config);
        assert_eq!(result, None);
    }

    #[test]
    fn test_zero_variance_short_circuits() {
        let config = OutlierConfig {
            window_size: 4,
            std_multiplier: 1.0,
        };
        let result = detect_sudden_change(&changes(&[2.0, 2.0, 2.0, 2.0, 50.0]), &config);
        assert_eq!(result, None);
    }

    #[test]
    fn test_short_history_and_zero_change() {
        let config = OutlierConfig::default();
        assert_eq!(detect_sudden_change(&changes(&[]), &config), None);
        assert_eq!(detect_sudden_change(&changes(&[1.0, 2.0, 90.0]), &config), None);

        let config = OutlierConfig {
            window_size: 2,
            std_multiplier: 1.0,
        };
        assert_eq!(detect_sudden_change(&changes(&[1.0, 3.0, 0.0]), &config), None);
    }

    #[test]
    fn test_scan_keeps_oldest_outlier_per_window() {
        let config = OutlierConfig {
            window_size: 4,
            std_multiplier: 1.0,
        };
        let deltas = [1.0, 2.0, 1.0, 2.0, 20.0, 1.0, 30.0, 1.0, 2.0, 1.0, 2.0, 40.0];
        let c = changes(&deltas);

        // Day 6 is anomalous on its own...
        let prefix = changes(&deltas[..7]);
        assert!(detect_sudden_change(&prefix, &config).is_some());

        // ...but falls in the window of the day-4 outlier
        let found = scan_outliers(&c, &config);
        let dates: Vec<NaiveDate> = found.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![c.dates()[4], c.dates()[11]]);
        assert_eq!(found[0].change, 20.0);
        assert_eq!(found[1].change, 40.0);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let config = OutlierConfig {
            window_size: 4,
            std_multiplier: 1.0,
        };
        let c = changes(&[1.0, 2.0, 1.0, 2.0, 20.0, -1.0, -2.0, -1.0, -30.0]);
        assert_eq!(scan_outliers(&c, &config), scan_outliers(&c, &config));
    }
}
