//! Reversal detection: the newest change flips the direction of the run before it

use serde::{Deserialize, Serialize};

use crate::series::{ChangeSeries, SymbolSeries};
use crate::streak::trailing_run;
use crate::types::{Direction, DirectionRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalResult {
    pub new_direction: Direction,
    pub prior_direction: Direction,
    /// Length of the run that was reversed (at least 1)
    pub prior_length: usize,
}

/// A reversal tagged with its symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolReversal {
    pub symbol: String,
    pub reversal: ReversalResult,
}

/// Compare the newest change ("yesterday") with the one before it.
///
/// A neutral change on either day means no reversal.
pub fn detect_reversal(changes: &ChangeSeries, rule: DirectionRule) -> Option<ReversalResult> {
    let deltas = changes.deltas();
    let (&yesterday, earlier) = deltas.split_last()?;
    let &day_before = earlier.last()?;

    let new_direction = rule.classify(yesterday)?;
    let prior_direction = rule.classify(day_before)?;
    if new_direction == prior_direction {
        return None;
    }

    // Run ending on the day before; its direction is already fixed as prior_direction
    let prior = trailing_run(earlier, rule)?;
    debug_assert_eq!(prior.direction, prior_direction);

    Some(ReversalResult {
        new_direction,
        prior_direction,
        prior_length: prior.length,
    })
}

/// Every symbol with a reversal, in caller order
pub fn find_reversals(universe: &[SymbolSeries], rule: DirectionRule) -> Vec<SymbolReversal> {
    universe
        .iter()
        .filter_map(|s| {
            detect_reversal(&ChangeSeries::diff(&s.series), rule).map(|reversal| SymbolReversal {
                symbol: s.symbol.clone(),
                reversal,
            })
        })
        .collect()
}
