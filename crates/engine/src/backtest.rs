//! Outlier backtest: what did price do after a sudden holdings change?
//!
//! Percentage changes of a holdings series are scanned for outliers; each
//! outlier is followed for `HORIZON_DAYS` days of closing prices. Events are
//! split by the sign of the change (whales buying vs selling) and scored per
//! horizon with `EV = average return * win rate`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::outlier::{scan_outliers, OutlierConfig, OutlierResult};
use crate::series::{ChangeSeries, Series};

/// Days of forward returns measured after each event
pub const HORIZON_DAYS: usize = 7;

pub const GRID_WINDOWS: [usize; 4] = [10, 15, 30, 45];
pub const GRID_MULTIPLIERS: [f64; 4] = [1.5, 2.0, 2.5, 3.0];

/// Which events a statistic was computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buyers,
    Sellers,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buyers => "buyers",
            Side::Sellers => "sellers",
        }
    }
}

/// One outlier with the price returns that followed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierEvent {
    pub date: NaiveDate,
    /// Percentage change of the holdings series
    pub pct_change: f64,
    /// Price return in percent after 1..=HORIZON_DAYS days
    pub forward_returns: Vec<f64>,
}

/// Statistics of one side at one horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonStats {
    pub days: usize,
    pub avg_return: f64,
    /// Share of events with a positive return, 0..=1
    pub win_rate: f64,
    /// Undefined when no event won
    pub expected_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideStats {
    pub side: Side,
    pub events: usize,
    /// One entry per horizon, empty when the side had no events
    pub horizons: Vec<HorizonStats>,
}

/// Best expected value of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestHorizon {
    pub side: Side,
    pub days: usize,
    pub expected_value: f64,
}

/// Result of one window/multiplier combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub window_size: usize,
    pub std_multiplier: f64,
    pub events: Vec<OutlierEvent>,
    pub buyers: SideStats,
    pub sellers: SideStats,
}

impl BacktestReport {
    pub fn best(&self) -> Option<BestHorizon> {
        let mut best: Option<BestHorizon> = None;
        for stats in [&self.buyers, &self.sellers] {
            for h in &stats.horizons {
                let Some(ev) = h.expected_value else {
                    continue;
                };
                if best.map_or(true, |b| ev > b.expected_value) {
                    best = Some(BestHorizon {
                        side: stats.side,
                        days: h.days,
                        expected_value: ev,
                    });
                }
            }
        }
        best
    }
}

/// Attach forward price returns to each outlier.
///
/// Outliers without a price on their date, a zero price, or fewer than
/// `HORIZON_DAYS` later prices are dropped.
pub fn forward_returns(outliers: &[OutlierResult], prices: &Series) -> Vec<OutlierEvent> {
    let points = prices.points();
    outliers
        .iter()
        .filter_map(|outlier| {
            let idx = prices.position_of(outlier.date)?;
            if idx + HORIZON_DAYS >= points.len() {
                return None;
            }
            let base = points[idx].value;
            if base == 0.0 {
                return None;
            }
            let forward_returns = (1..=HORIZON_DAYS)
                .map(|d| (points[idx + d].value / base - 1.0) * 100.0)
                .collect();
            Some(OutlierEvent {
                date: outlier.date,
                pct_change: outlier.change,
                forward_returns,
            })
        })
        .collect()
}

fn side_stats(side: Side, events: &[&OutlierEvent]) -> SideStats {
    if events.is_empty() {
        return SideStats {
            side,
            events: 0,
            horizons: Vec::new(),
        };
    }

    let n = events.len() as f64;
    let horizons = (0..HORIZON_DAYS)
        .map(|h| {
            let returns = events.iter().map(|e| e.forward_returns[h]);
            let avg_return = returns.clone().sum::<f64>() / n;
            let win_rate = returns.filter(|r| *r > 0.0).count() as f64 / n;
            HorizonStats {
                days: h + 1,
                avg_return,
                win_rate,
                expected_value: (win_rate > 0.0).then_some(avg_return * win_rate),
            }
        })
        .collect();

    SideStats {
        side,
        events: events.len(),
        horizons,
    }
}

/// Backtest one parameter combination
pub fn run_backtest(holdings: &Series, prices: &Series, config: &OutlierConfig) -> BacktestReport {
    let changes = ChangeSeries::percent(holdings);
    let outliers = scan_outliers(&changes, config);
    let events = forward_returns(&outliers, prices);

    let buyers: Vec<&OutlierEvent> = events.iter().filter(|e| e.pct_change > 0.0).collect();
    let sellers: Vec<&OutlierEvent> = events.iter().filter(|e| e.pct_change < 0.0).collect();

    BacktestReport {
        window_size: config.window_size,
        std_multiplier: config.std_multiplier,
        buyers: side_stats(Side::Buyers, &buyers),
        sellers: side_stats(Side::Sellers, &sellers),
        events,
    }
}

/// All grid runs plus the index of the best one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub runs: Vec<BacktestReport>,
    pub best: Option<usize>,
}

impl GridSearchResult {
    pub fn best_run(&self) -> Option<&BacktestReport> {
        self.best.and_then(|i| self.runs.get(i))
    }
}

/// Window/multiplier combinations in grid order
pub fn generate_grid() -> Vec<OutlierConfig> {
    let mut grid = Vec::with_capacity(GRID_WINDOWS.len() * GRID_MULTIPLIERS.len());
    for &window_size in &GRID_WINDOWS {
        for &std_multiplier in &GRID_MULTIPLIERS {
            grid.push(OutlierConfig {
                window_size,
                std_multiplier,
            });
        }
    }
    grid
}

/// Run every grid combination; the best run has the highest EV on any side
/// and horizon, earlier runs winning ties.
pub fn grid_search(holdings: &Series, prices: &Series) -> GridSearchResult {
    let runs: Vec<BacktestReport> = generate_grid()
        .iter()
        .map(|config| run_backtest(holdings, prices, config))
        .collect();

    let mut best: Option<(usize, f64)> = None;
    for (i, run) in runs.iter().enumerate() {
        if let Some(b) = run.best() {
            if best.map_or(true, |(_, ev)| b.expected_value > ev) {
                best = Some((i, b.expected_value));
            }
        }
    }

    GridSearchResult {
        runs,
        best: best.map(|(i, _)| i),
    }
}

/// Stable identity of a run over the same inputs
pub fn compute_params_hash(
    source: &str,
    symbol: &str,
    price_symbol: &str,
    config: &OutlierConfig,
    span: Option<(NaiveDate, NaiveDate)>,
) -> String {
    let span = span
        .map(|(first, last)| format!("{first}..{last}"))
        .unwrap_or_default();
    let input = format!(
        "{}:{}:{}:{}:{}:{}",
        source, symbol, price_symbol, config.window_size, config.std_multiplier, span
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Plain-text summary of a grid search
pub fn render_summary(symbol: &str, result: &GridSearchResult) -> String {
    let mut out = format!(
        "{:<8}{:<8}{:<8}{:<10}{:<6}{:>10}\n",
        "Window", "K", "Events", "Side", "Days", "EV %"
    );
    out.push_str(&"-".repeat(50));
    out.push('\n');
    for run in &result.runs {
        let (side, days, ev) = match run.best() {
            Some(b) => (
                b.side.as_str().to_string(),
                b.days.to_string(),
                format!("{:.3}", b.expected_value),
            ),
            None => ("-".to_string(), "-".to_string(), "n/a".to_string()),
        };
        out.push_str(&format!(
            "{:<8}{:<8}{:<8}{:<10}{:<6}{:>10}\n",
            run.window_size,
            run.std_multiplier,
            run.events.len(),
            side,
            days,
            ev
        ));
    }
    match result.best_run().and_then(|r| r.best().map(|b| (r, b))) {
        Some((run, b)) => out.push_str(&format!(
            "\nBest for {}: window {} / k {} -> {} after {} days, EV {:.3}%\n",
            symbol,
            run.window_size,
            run.std_multiplier,
            b.side.as_str(),
            b.days,
            b.expected_value
        )),
        None => out.push_str(&format!("\nNo profitable configuration for {symbol}\n")),
    }
    out
}
