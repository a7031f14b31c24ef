//! Streak detection: the trailing run of same-direction daily changes

use serde::{Deserialize, Serialize};

use crate::series::{ChangeSeries, SymbolSeries};
use crate::types::{Direction, DirectionRule};

/// Shortest run that counts as a streak
pub const MIN_STREAK_LEN: usize = 2;

/// The most recent run of same-direction changes for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakResult {
    pub direction: Direction,
    pub length: usize,
}

/// All symbols tied for the longest streak, grouped by direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakGroup {
    pub length: usize,
    pub increasing: Vec<String>,
    pub decreasing: Vec<String>,
}

/// Length and direction of the trailing run in `changes` (newest last).
///
/// The newest non-neutral change fixes the direction; the scan stops at the
/// first change of the other direction, at a neutral change, or at the start
/// of history. A neutral newest change yields no streak.
pub fn trailing_run(changes: &[f64], rule: DirectionRule) -> Option<StreakResult> {
    let mut direction = None;
    let mut length = 0usize;

    for &change in changes.iter().rev() {
        let Some(current) = rule.classify(change) else {
            break;
        };
        match direction {
            None => direction = Some(current),
            Some(d) if d != current => break,
            Some(_) => {}
        }
        length += 1;
    }

    direction.map(|direction| StreakResult { direction, length })
}

/// Streak of at least `MIN_STREAK_LEN` days, or `None`
pub fn detect_streak(changes: &ChangeSeries, rule: DirectionRule) -> Option<StreakResult> {
    trailing_run(changes.deltas(), rule).filter(|s| s.length >= MIN_STREAK_LEN)
}

/// Symbols tied for the maximum streak length, in caller order
pub fn longest_streaks(universe: &[SymbolSeries], rule: DirectionRule) -> Option<StreakGroup> {
    let streaks: Vec<(&str, StreakResult)> = universe
        .iter()
        .filter_map(|s| {
            detect_streak(&ChangeSeries::diff(&s.series), rule).map(|r| (s.symbol.as_str(), r))
        })
        .collect();

    let length = streaks.iter().map(|(_, r)| r.length).max()?;

    let mut group = StreakGroup {
        length,
        increasing: Vec::new(),
        decreasing: Vec::new(),
    };
    for (symbol, result) in streaks.into_iter().filter(|(_, r)| r.length == length) {
        match result.direction {
            Direction::Increasing => group.increasing.push(symbol.to_string()),
            Direction::Decreasing => group.decreasing.push(symbol.to_string()),
        }
    }
    Some(group)
}
