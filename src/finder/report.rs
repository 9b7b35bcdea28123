//! Human-readable trade plans for discovered cycles.

use std::fmt::Write as _;

use crate::graph::RateGraph;

/// Render `path` as a step-by-step trade plan starting from
/// `starting_amount` of `path[0]`'s currency.
///
/// With `depth` each step is clamped to the edge's available volume and
/// annotated with the amount actually traded. Steps name the venue and
/// market they execute on. Returns `None` for an empty path or one
/// referencing a missing edge.
#[must_use]
pub fn trade_plan(
    graph: &RateGraph,
    path: &[String],
    starting_amount: f64,
    depth: bool,
) -> Option<String> {
    let first = path.first()?;
    let mut plan = format!("Starting with {starting_amount} in {first}\n");
    let mut amount = starting_amount;

    for pair in path.windows(2) {
        let edge = graph.edge(&pair[0], &pair[1])?;
        let rate = (-edge.weight).exp();

        let traded = if depth {
            let capacity = (-edge.depth_or_unbounded()).exp();
            amount.min(capacity)
        } else {
            amount
        };
        amount = traded * rate;

        let _ = write!(
            plan,
            "{} to {} at {} = {} on {} for {}",
            pair[0], pair[1], rate, amount, edge.exchange, edge.market
        );
        if depth {
            let _ = write!(plan, " with {} of {} traded", traded, pair[0]);
        }
        plan.push('\n');
    }
    Some(plan)
}
