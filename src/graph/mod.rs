//! Rate graphs: edge records, single-venue digraph, cross-venue
//! multigraph, and the builders that assemble them from tickers.

mod builder;
mod edge;
mod multi;
mod rate;

pub use builder::{
    build_multi_exchange_graph, load_exchange_graph, GraphOptions, DEFAULT_TAKER_FEE,
    FEE_RETRY_DELAY, MAX_FEE_LOAD_ATTEMPTS,
};
pub use edge::{RateEdge, TradeType};
pub use multi::RateMultiGraph;
pub use rate::{EdgeSnapshot, GraphSnapshot, QuoteSide, RateGraph};
