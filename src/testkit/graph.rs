//! Graph fixtures built from edge lists.

use crate::exchange::{ExchangeId, Symbol};
use crate::graph::{RateEdge, RateGraph, RateMultiGraph, TradeType};

/// One fixture edge: a directional rate plus the volume available at
/// it, denominated in the tail node's currency.
#[derive(Debug, Clone)]
pub struct DepthEdge {
    pub from: &'static str,
    pub to: &'static str,
    pub rate: f64,
    pub depth: f64,
    pub trade: TradeType,
}

impl DepthEdge {
    #[must_use]
    pub fn sell(from: &'static str, to: &'static str, rate: f64, depth: f64) -> Self {
        Self {
            from,
            to,
            rate,
            depth,
            trade: TradeType::Sell,
        }
    }

    #[must_use]
    pub fn buy(from: &'static str, to: &'static str, rate: f64, depth: f64) -> Self {
        Self {
            from,
            to,
            rate,
            depth,
            trade: TradeType::Buy,
        }
    }

    fn into_rate_edge(self, fee: f64) -> RateEdge {
        // Sell edges trade the from/to market, buy edges the to/from
        // market (the base currency is the head node).
        let market = match self.trade {
            TradeType::Sell => Symbol::new(self.from, self.to),
            TradeType::Buy => Symbol::new(self.to, self.from),
        };
        RateEdge {
            weight: -(self.rate * (1.0 - fee)).ln(),
            depth: Some(-self.depth.ln()),
            market,
            exchange: ExchangeId::from("test"),
            trade: self.trade,
            fee,
            no_fee_rate: self.rate,
            volume: Some(self.depth),
        }
    }
}

/// A depth-less graph where every listed edge sells `from` into `to`
/// at `rate`, net of `fee`.
#[must_use]
pub fn graph_from_rates(edges: &[(&str, &str, f64)], fee: f64) -> RateGraph {
    let mut graph = RateGraph::for_exchange(ExchangeId::from("test"));
    for &(from, to, rate) in edges {
        graph.upsert_edge(
            from,
            to,
            RateEdge {
                weight: -(rate * (1.0 - fee)).ln(),
                depth: None,
                market: Symbol::new(from, to),
                exchange: ExchangeId::from("test"),
                trade: TradeType::Sell,
                fee,
                no_fee_rate: rate,
                volume: None,
            },
        );
    }
    graph
}

/// A depth-annotated graph from [`DepthEdge`] fixtures.
#[must_use]
pub fn graph_from_depth_edges(edges: &[DepthEdge], fee: f64) -> RateGraph {
    let mut graph = RateGraph::for_exchange(ExchangeId::from("test"));
    for edge in edges {
        graph.upsert_edge(edge.from, edge.to, edge.clone().into_rate_edge(fee));
    }
    graph
}

/// A multigraph where each `(from, to, venue, rate)` tuple contributes
/// one parallel edge.
#[must_use]
pub fn multigraph_from_rates(edges: &[(&str, &str, &str, f64)], fee: f64) -> RateMultiGraph {
    let mut graph = RateMultiGraph::new();
    for &(from, to, venue, rate) in edges {
        graph.add_edge(
            from,
            to,
            RateEdge {
                weight: -(rate * (1.0 - fee)).ln(),
                depth: None,
                market: Symbol::new(from, to),
                exchange: ExchangeId::from(venue),
                trade: TradeType::Sell,
                fee,
                no_fee_rate: rate,
                volume: None,
            },
        );
    }
    graph
}
