//! Shared types for the analytics engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single candlestick (OHLCV)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

/// Direction of a day-over-day change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Increasing => Direction::Decreasing,
            Direction::Decreasing => Direction::Increasing,
        }
    }
}

/// Classifies a change as increasing, decreasing or neutral.
///
/// Changes inside `[-flat_band, flat_band]` are neutral; with the default band
/// of zero this is the strict `> 0` / `< 0` rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionRule {
    pub flat_band: f64,
}

impl Default for DirectionRule {
    fn default() -> Self {
        Self { flat_band: 0.0 }
    }
}

impl DirectionRule {
    pub fn classify(&self, change: f64) -> Option<Direction> {
        if change > self.flat_band {
            Some(Direction::Increasing)
        } else if change < -self.flat_band {
            Some(Direction::Decreasing)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_rule() {
        let rule = DirectionRule::default();
        assert_eq!(rule.classify(0.5), Some(Direction::Increasing));
        assert_eq!(rule.classify(-0.5), Some(Direction::Decreasing));
        assert_eq!(rule.classify(0.0), None);
        assert_eq!(rule.classify(f64::NAN), None);
    }

    #[test]
    fn test_flat_band() {
        let rule = DirectionRule { flat_band: 1.0 };
        assert_eq!(rule.classify(1.0), None);
        assert_eq!(rule.classify(-0.9), None);
        assert_eq!(rule.classify(1.1), Some(Direction::Increasing));
        assert_eq!(Direction::Increasing.opposite(), Direction::Decreasing);
    }
}
