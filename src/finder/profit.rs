//! Profit-ratio accounting for discovered cycles.

use crate::exchange::Symbol;
use crate::graph::{RateGraph, TradeType};

/// One executed leg of a cycle, for the caller's order ledger.
///
/// `volume` is denominated in the market's base currency for both
/// order sides: buy legs are converted from source (quote) units via
/// the directional rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    pub market: Symbol,
    /// Directional no-fee rate actually applied along the edge.
    pub rate: f64,
    pub fee: f64,
    pub volume: f64,
    pub order: TradeType,
}

/// Gross profit multiplier of `path`, ignoring volumes: the product of
/// `no_fee_rate * (1 - fee)` over its edges, i.e. `exp(-Σ weight)`.
///
/// Returns `None` when the path references a missing edge.
#[must_use]
pub fn profit_ratio_for_path(graph: &RateGraph, path: &[String]) -> Option<f64> {
    let mut total = 0.0;
    for pair in path.windows(2) {
        total += graph.edge(&pair[0], &pair[1])?.weight;
    }
    Some((-total).exp())
}

/// Profit multiplier of `path` with per-edge volume clamps, starting
/// from `starting_amount` of `path[0]`'s currency.
///
/// When `gather_ledger` is set the returned vec holds one [`PathStep`]
/// per edge; otherwise it is empty.
#[must_use]
pub fn profit_ratio_with_depth(
    graph: &RateGraph,
    path: &[String],
    starting_amount: f64,
    gather_ledger: bool,
) -> Option<(f64, Vec<PathStep>)> {
    let mut amount = starting_amount;
    let mut ledger = Vec::new();

    for pair in path.windows(2) {
        let edge = graph.edge(&pair[0], &pair[1])?;
        let capacity = (-edge.depth_or_unbounded()).exp();
        let traded = amount.min(capacity);
        if gather_ledger {
            let volume = match edge.trade {
                TradeType::Sell => traded,
                TradeType::Buy => traded * edge.no_fee_rate,
            };
            ledger.push(PathStep {
                market: edge.market.clone(),
                rate: edge.no_fee_rate,
                fee: edge.fee,
                volume,
                order: edge.trade,
            });
        }
        amount = traded * (-edge.weight).exp();
    }

    Some((amount / starting_amount, ledger))
}
