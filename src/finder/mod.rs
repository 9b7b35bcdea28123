//! Negative-cycle search and profit accounting.

mod bellman;
mod depth;
mod multi;
mod profit;
mod report;

pub use bellman::{Cycles, NegativeCycleFinder};
pub use depth::{starting_volume, DepthCycleFinder, DepthCycles};
pub use multi::{bellman_ford_multi, MultiCycleFinder};
pub use profit::{profit_ratio_for_path, profit_ratio_with_depth, PathStep};
pub use report::trade_plan;
