//! Insight selection across a universe of symbols
//!
//! Combines the streak, reversal and sudden-change detectors with the
//! largest-mover selection into one ordered list of `Insight`s.

use serde::{Deserialize, Serialize};

use crate::outlier::{detect_sudden_change, OutlierConfig, OutlierResult};
use crate::reversal::{find_reversals, ReversalResult};
use crate::series::{ChangeSeries, SymbolSeries};
use crate::streak::{longest_streaks, StreakGroup};
use crate::types::DirectionRule;

/// Newest-day move of one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub symbol: String,
    pub abs_change: f64,
    pub pct_change: f64,
}

/// Largest percentage increase and decrease across symbols
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LargestMoves {
    pub increase: Option<Move>,
    pub decrease: Option<Move>,
}

/// One reportable finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insight {
    Streak(StreakGroup),
    Reversal {
        symbol: String,
        #[serde(flatten)]
        reversal: ReversalResult,
    },
    LargestIncrease(Move),
    LargestDecrease(Move),
    SuddenChange {
        symbol: String,
        window_size: usize,
        #[serde(flatten)]
        outlier: OutlierResult,
    },
}

impl Insight {
    /// Symbols this insight mentions
    pub fn symbols(&self) -> Vec<&str> {
        match self {
            Insight::Streak(group) => group
                .increasing
                .iter()
                .chain(group.decreasing.iter())
                .map(String::as_str)
                .collect(),
            Insight::Reversal { symbol, .. } | Insight::SuddenChange { symbol, .. } => {
                vec![symbol.as_str()]
            }
            Insight::LargestIncrease(m) | Insight::LargestDecrease(m) => vec![m.symbol.as_str()],
        }
    }
}

/// Which categories to collect and with which parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    pub streaks: bool,
    pub reversals: bool,
    pub largest_moves: bool,
    pub sudden_changes: bool,
    pub outlier: OutlierConfig,
    pub direction_rule: DirectionRule,
    /// Symbols containing any of these substrings are ignored
    pub excluded_symbols: Vec<String>,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            streaks: true,
            reversals: true,
            largest_moves: true,
            sudden_changes: true,
            outlier: OutlierConfig::default(),
            direction_rule: DirectionRule::default(),
            excluded_symbols: Vec::new(),
        }
    }
}

impl InsightConfig {
    /// Streaks, reversals and sudden changes over a 30-day window (address-bucket reports)
    pub fn distribution() -> Self {
        Self {
            largest_moves: false,
            ..Self::default()
        }
    }

    /// Streaks, reversals and largest movers, stablecoins ignored (entity holdings)
    pub fn holdings() -> Self {
        Self {
            sudden_changes: false,
            excluded_symbols: vec!["USDT".to_string(), "USDC".to_string()],
            ..Self::default()
        }
    }

    fn includes(&self, symbol: &str) -> bool {
        !self
            .excluded_symbols
            .iter()
            .any(|excluded| symbol.contains(excluded.as_str()))
    }
}

/// Largest percentage increase and decrease of the newest observation.
///
/// Symbols with fewer than two observations or a zero previous value are
/// skipped. Ties keep the symbol that comes first in `universe`.
pub fn largest_moves(universe: &[SymbolSeries]) -> LargestMoves {
    let mut increase: Option<Move> = None;
    let mut decrease: Option<Move> = None;

    for entry in universe {
        let (Some(today), Some(yesterday)) =
            (entry.series.value_back(0), entry.series.value_back(1))
        else {
            continue;
        };
        if yesterday == 0.0 {
            continue;
        }

        let abs_change = today - yesterday;
        let pct_change = abs_change / yesterday * 100.0;
        let candidate = Move {
            symbol: entry.symbol.clone(),
            abs_change,
            pct_change,
        };

        if pct_change > 0.0 && increase.as_ref().map_or(true, |m| pct_change > m.pct_change) {
            increase = Some(candidate);
        } else if pct_change < 0.0
            && decrease.as_ref().map_or(true, |m| pct_change < m.pct_change)
        {
            decrease = Some(candidate);
        }
    }

    LargestMoves { increase, decrease }
}

/// Run every enabled detector and return insights in the fixed order:
/// streak group, reversals, largest increase, largest decrease, sudden changes.
pub fn collect_insights(universe: &[SymbolSeries], config: &InsightConfig) -> Vec<Insight> {
    let universe: Vec<SymbolSeries> = universe
        .iter()
        .filter(|s| config.includes(&s.symbol))
        .cloned()
        .collect();
    let mut insights = Vec::new();

    if config.streaks {
        if let Some(group) = longest_streaks(&universe, config.direction_rule) {
            insights.push(Insight::Streak(group));
        }
    }

    if config.reversals {
        insights.extend(find_reversals(&universe, config.direction_rule).into_iter().map(
            |r| Insight::Reversal {
                symbol: r.symbol,
                reversal: r.reversal,
            },
        ));
    }

    if config.largest_moves {
        let moves = largest_moves(&universe);
        insights.extend(moves.increase.map(Insight::LargestIncrease));
        insights.extend(moves.decrease.map(Insight::LargestDecrease));
    }

    if config.sudden_changes {
        for entry in &universe {
            let changes = ChangeSeries::diff(&entry.series);
            if let Some(outlier) = detect_sudden_change(&changes, &config.outlier) {
                insights.push(Insight::SuddenChange {
                    symbol: entry.symbol.clone(),
                    window_size: config.outlier.window_size,
                    outlier,
                });
            }
        }
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;
    use crate::types::Direction;
    use chrono::NaiveDate;

    fn symbol(name: &str, values: &[f64]) -> SymbolSeries {
        let start = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        SymbolSeries::new(
            name,
            Series::from_pairs(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| (start + chrono::Duration::days(i as i64), v)),
            ),
        )
    }

    #[test]
    fn test_largest_moves_picks_extremes() {
        let universe = vec![
            symbol("A", &[100.0, 105.0]),
            symbol("B", &[100.0, 92.0]),
            symbol("C", &[100.0, 102.0]),
        ];
        let moves = largest_moves(&universe);
        let inc = moves.increase.unwrap();
        assert_eq!(inc.symbol, "A");
        assert!((inc.pct_change - 5.0).abs() < 1e-9);
        let dec = moves.decrease.unwrap();
        assert_eq!(dec.symbol, "B");
        assert!((dec.abs_change + 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_largest_moves_tie_keeps_first_in_order() {
        let universe = vec![
            symbol("X", &[50.0, 55.0]),
            symbol("Y", &[200.0, 220.0]),
            symbol("Z", &[10.0, 9.0]),
            symbol("W", &[20.0, 18.0]),
        ];
        for _ in 0..3 {
            let moves = largest_moves(&universe);
            assert_eq!(moves.increase.unwrap().symbol, "X");
            assert_eq!(moves.decrease.unwrap().symbol, "Z");
        }
    }

    #[test]
    fn test_largest_moves_skips_zero_base_and_flat() {
        let universe = vec![
            symbol("NEW", &[0.0, 500.0]),
            symbol("FLAT", &[3.0, 3.0]),
            symbol("ONE", &[7.0]),
        ];
        assert_eq!(largest_moves(&universe), LargestMoves::default());
    }

    #[test]
    fn test_collect_insights_fixed_order() {
        let universe = vec![
            // Three increases in a row
            symbol("ETH", &[1.0, 2.0, 3.0, 4.0]),
            // Decrease after two increases
            symbol("LINK", &[1.0, 2.0, 3.0, 2.0]),
            symbol("USDC", &[1.0, 2.0, 3.0, 4.0, 5.0]),
        ];
        let insights = collect_insights(&universe, &InsightConfig::holdings());

        assert_eq!(insights.len(), 4);
        match &insights[0] {
            Insight::Streak(group) => {
                assert_eq!(group.length, 3);
                assert_eq!(group.increasing, vec!["ETH"]);
            }
            other => panic!("expected streak, got {other:?}"),
        }
        match &insights[1] {
            Insight::Reversal { symbol, reversal } => {
                assert_eq!(symbol, "LINK");
                assert_eq!(reversal.new_direction, Direction::Decreasing);
                assert_eq!(reversal.prior_length, 2);
            }
            other => panic!("expected reversal, got {other:?}"),
        }
        assert!(matches!(&insights[2], Insight::LargestIncrease(m) if m.symbol == "ETH"));
        assert!(matches!(&insights[3], Insight::LargestDecrease(m) if m.symbol == "LINK"));
    }

    #[test]
    fn test_collect_insights_sudden_change_last() {
        let mut values = vec![100.0];
        for i in 0..12 {
            let step = if i % 2 == 0 { 1.0 } else { 2.0 };
            values.push(values.last().unwrap() + step);
        }
        values.push(values.last().unwrap() + 40.0);

        let config = InsightConfig {
            outlier: OutlierConfig {
                window_size: 10,
                std_multiplier: 1.0,
            },
            ..InsightConfig::distribution()
        };
        let insights = collect_insights(&[symbol("100+ BTC", &values)], &config);

        assert!(matches!(insights.first(), Some(Insight::Streak(_))));
        match insights.last() {
            Some(Insight::SuddenChange {
                symbol,
                window_size,
                outlier,
            }) => {
                assert_eq!(symbol, "100+ BTC");
                assert_eq!(*window_size, 10);
                assert_eq!(outlier.change, 40.0);
            }
            other => panic!("expected sudden change, got {other:?}"),
        }
    }

    #[test]
    fn test_insight_serializes_with_kind_tag() {
        let insight = Insight::LargestIncrease(Move {
            symbol: "ETH".into(),
            abs_change: 2.0,
            pct_change: 1.0,
        });
        let json = serde_json::to_value(&insight).unwrap();
        assert_eq!(json["kind"], "largest_increase");
        assert_eq!(json["symbol"], "ETH");
    }
}
