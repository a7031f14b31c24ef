//! Spot bitcoin ETF net flows
//!
//! Flows are ingested as holdings snapshots under the `etf` source, one value
//! per fund ticker and trading day, in US$ millions (outflows negative). Days
//! without a figure are simply not stored.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::series::{Series, SymbolSeries};
use crate::streak::trailing_run;
use crate::types::{Direction, DirectionRule};

/// Source key under which ETF flows are stored
pub const ETF_SOURCE: &str = "etf";

/// Calendar days summed for the "Last Month" column and the sudden-buy average
pub const FLOW_WINDOW_DAYS: i64 = 30;

/// A flow above this multiple of the window average is a sudden buy
pub const SUDDEN_BUY_FACTOR: f64 = 1.5;

/// Consecutive same-sign flow days reported as a trend
pub const TREND_DAYS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtfFund {
    pub ticker: &'static str,
    pub title: &'static str,
}

/// Funds in report order
pub const FUNDS: [EtfFund; 3] = [
    EtfFund { ticker: "IBIT", title: "BlackRock (IBIT)" },
    EtfFund { ticker: "FBTC", title: "Fidelity (FBTC)" },
    EtfFund { ticker: "BITB", title: "Bitwise (BITB)" },
];

pub fn fund_tickers() -> Vec<&'static str> {
    FUNDS.iter().map(|f| f.ticker).collect()
}

/// One table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub title: String,
    pub latest: Option<f64>,
    pub previous: Option<f64>,
    pub month_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuddenBuy {
    pub title: String,
    pub flow: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowTrend {
    pub title: String,
    pub direction: Direction,
    pub days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    pub as_of: NaiveDate,
    pub rows: Vec<FlowSummary>,
    pub sudden_buys: Vec<SuddenBuy>,
    pub trends: Vec<FlowTrend>,
}

fn value_on(series: &Series, date: NaiveDate) -> Option<f64> {
    series.position_of(date).map(|i| series.points()[i].value)
}

fn window_values(series: &Series, as_of: NaiveDate) -> Vec<f64> {
    let start = as_of - Duration::days(FLOW_WINDOW_DAYS);
    series
        .points()
        .iter()
        .filter(|p| p.date > start && p.date <= as_of)
        .map(|p| p.value)
        .collect()
}

/// Flow table, sudden buys and trends as of the newest flow date.
///
/// "Previous" is the newest trading day before `as_of` on which any fund
/// reported. Returns `None` when no tracked fund has a flow stored.
pub fn analyze_flows(universe: &[SymbolSeries]) -> Option<FlowReport> {
    let funds: Vec<(&EtfFund, &Series)> = FUNDS
        .iter()
        .filter_map(|fund| {
            universe
                .iter()
                .find(|s| s.symbol == fund.ticker)
                .map(|s| (fund, &s.series))
        })
        .collect();

    let as_of = funds
        .iter()
        .filter_map(|(_, series)| series.latest().map(|p| p.date))
        .max()?;
    let previous_date = funds
        .iter()
        .flat_map(|(_, series)| series.points().iter().map(|p| p.date))
        .filter(|d| *d < as_of)
        .max();

    let mut report = FlowReport {
        as_of,
        rows: Vec::new(),
        sudden_buys: Vec::new(),
        trends: Vec::new(),
    };

    for fund in &FUNDS {
        let series = funds
            .iter()
            .find(|(f, _)| f.ticker == fund.ticker)
            .map(|(_, s)| *s);
        let Some(series) = series else {
            report.rows.push(FlowSummary {
                title: fund.title.to_string(),
                latest: None,
                previous: None,
                month_total: None,
            });
            continue;
        };

        let latest = value_on(series, as_of);
        let window = window_values(series, as_of);
        report.rows.push(FlowSummary {
            title: fund.title.to_string(),
            latest,
            previous: previous_date.and_then(|d| value_on(series, d)),
            month_total: (!window.is_empty()).then(|| window.iter().sum()),
        });

        if let Some(flow) = latest.filter(|f| *f > 0.0) {
            let average = window.iter().sum::<f64>() / window.len() as f64;
            if flow > average * SUDDEN_BUY_FACTOR {
                report.sudden_buys.push(SuddenBuy {
                    title: fund.title.to_string(),
                    flow,
                    average,
                });
            }
        }

        let flows: Vec<f64> = series.points().iter().map(|p| p.value).collect();
        if let Some(run) = trailing_run(&flows, DirectionRule::default()) {
            if run.length >= TREND_DAYS {
                report.trends.push(FlowTrend {
                    title: fund.title.to_string(),
                    direction: run.direction,
                    days: run.length,
                });
            }
        }
    }

    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn fund(ticker: &str, flows: &[(u32, f64)]) -> SymbolSeries {
        SymbolSeries::new(
            ticker,
            Series::from_pairs(flows.iter().map(|(d, v)| (day(*d), *v))),
        )
    }

    #[test]
    fn test_table_uses_newest_and_previous_trading_day() {
        let universe = vec![
            fund("IBIT", &[(3, 10.0), (4, 20.0), (7, 30.0)]),
            fund("FBTC", &[(3, -5.0), (4, 15.0)]),
        ];
        let report = analyze_flows(&universe).unwrap();

        assert_eq!(report.as_of, day(7));
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[0].latest, Some(30.0));
        assert_eq!(report.rows[0].previous, Some(20.0));
        assert_eq!(report.rows[0].month_total, Some(60.0));

        assert_eq!(report.rows[1].latest, None);
        assert_eq!(report.rows[1].previous, Some(15.0));
        assert_eq!(report.rows[1].month_total, Some(10.0));

        assert_eq!(report.rows[2].title, "Bitwise (BITB)");
        assert_eq!(report.rows[2].month_total, None);
    }

    #[test]
    fn test_sudden_buy_against_window_average() {
        let universe = vec![
            fund("IBIT", &[(3, 10.0), (4, 10.0), (5, 10.0), (6, 100.0)]),
            fund("FBTC", &[(3, 10.0), (4, 10.0), (5, 10.0), (6, 12.0)]),
            fund("BITB", &[(3, -50.0), (4, -50.0), (5, -50.0), (6, -1.0)]),
        ];
        let report = analyze_flows(&universe).unwrap();

        assert_eq!(report.sudden_buys.len(), 1);
        assert_eq!(report.sudden_buys[0].title, "BlackRock (IBIT)");
        assert_eq!(report.sudden_buys[0].average, 32.5);
    }

    #[test]
    fn test_trend_needs_three_same_sign_days() {
        let universe = vec![
            fund("IBIT", &[(3, 10.0), (4, 5.0), (5, 1.0)]),
            fund("FBTC", &[(3, -1.0), (4, -2.0), (5, -3.0), (6, -4.0)]),
            fund("BITB", &[(4, -1.0), (5, 2.0), (6, 3.0)]),
        ];
        let report = analyze_flows(&universe).unwrap();

        assert_eq!(
            report.trends,
            vec![
                FlowTrend {
                    title: "BlackRock (IBIT)".to_string(),
                    direction: Direction::Increasing,
                    days: 3,
                },
                FlowTrend {
                    title: "Fidelity (FBTC)".to_string(),
                    direction: Direction::Decreasing,
                    days: 4,
                },
            ]
        );
    }

    #[test]
    fn test_no_fund_data() {
        assert_eq!(analyze_flows(&[fund("GBTC", &[(3, 1.0)])]), None);
        assert_eq!(analyze_flows(&[]), None);
    }
}
