//! The directed rate graph over currency nodes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::exchange::{ExchangeId, Symbol};
use crate::graph::{RateEdge, TradeType};

/// Which side of the book a pushed quote updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSide {
    Bid,
    Ask,
}

/// A directed graph of currencies where each edge carries one
/// [`RateEdge`]. At most one edge exists per ordered node pair;
/// re-inserting replaces the previous edge.
#[derive(Debug, Clone)]
pub struct RateGraph {
    graph: DiGraph<String, RateEdge>,
    nodes: HashMap<String, NodeIndex>,
    exchange: Option<ExchangeId>,
    timestamp: DateTime<Utc>,
}

impl Default for RateGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RateGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            exchange: None,
            timestamp: Utc::now(),
        }
    }

    /// A graph carrying the venue it was built from.
    #[must_use]
    pub fn for_exchange(exchange: ExchangeId) -> Self {
        Self {
            exchange: Some(exchange),
            ..Self::new()
        }
    }

    /// The venue this graph was built from, when single-venue.
    #[must_use]
    pub fn exchange(&self) -> Option<&ExchangeId> {
        self.exchange.as_ref()
    }

    /// When the graph was assembled.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub(crate) fn intern(&mut self, currency: &str) -> NodeIndex {
        if let Some(&index) = self.nodes.get(currency) {
            return index;
        }
        let index = self.graph.add_node(currency.to_string());
        self.nodes.insert(currency.to_string(), index);
        index
    }

    #[must_use]
    pub fn node_index(&self, currency: &str) -> Option<NodeIndex> {
        self.nodes.get(currency).copied()
    }

    #[must_use]
    pub fn currency(&self, index: NodeIndex) -> &str {
        &self.graph[index]
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn currencies(&self) -> Vec<&str> {
        self.graph.node_weights().map(String::as_str).collect()
    }

    /// Insert or replace the edge `from -> to`. Self-loops are ignored:
    /// a market can never trade a currency against itself.
    pub fn upsert_edge(&mut self, from: &str, to: &str, edge: RateEdge) {
        if from == to {
            return;
        }
        let from = self.intern(from);
        let to = self.intern(to);
        self.graph.update_edge(from, to, edge);
    }

    #[must_use]
    pub fn edge(&self, from: &str, to: &str) -> Option<&RateEdge> {
        let from = self.node_index(from)?;
        let to = self.node_index(to)?;
        let edge = self.graph.find_edge(from, to)?;
        self.graph.edge_weight(edge)
    }

    fn edge_mut(&mut self, from: &str, to: &str) -> Option<&mut RateEdge> {
        let from = self.node_index(from)?;
        let to = self.node_index(to)?;
        let edge = self.graph.find_edge(from, to)?;
        self.graph.edge_weight_mut(edge)
    }

    /// Iterate all edges as `(from, to, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &RateEdge)> {
        self.graph.edge_references().map(|edge| {
            (
                self.graph[edge.source()].as_str(),
                self.graph[edge.target()].as_str(),
                edge.weight(),
            )
        })
    }

    pub(crate) fn petgraph(&self) -> &DiGraph<String, RateEdge> {
        &self.graph
    }

    /// A serializable snapshot of the whole graph.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            exchange: self.exchange.clone(),
            timestamp: self.timestamp,
            edges: self
                .edges()
                .map(|(from, to, edge)| EdgeSnapshot {
                    from: from.to_string(),
                    to: to.to_string(),
                    market: edge.market.to_string(),
                    exchange: edge.exchange.clone(),
                    trade: edge.trade.to_string(),
                    weight: edge.weight,
                    depth: edge.depth,
                    fee: edge.fee,
                    no_fee_rate: edge.no_fee_rate,
                    volume: edge.volume,
                })
                .collect(),
        }
    }

    // -- Push-update helper ---------------------------------------------------

    /// Seed both directed edges for `symbol` with unusable placeholder
    /// quotes so later pushed updates can rewrite them in place.
    ///
    /// Placeholder edges carry infinite weight, which keeps them out of
    /// any reduced graph until a real quote arrives.
    pub fn add_placeholder_market(&mut self, symbol: &Symbol, taker_fee: f64) {
        let exchange = self.exchange.clone().unwrap_or_else(|| ExchangeId::from("unknown"));
        let placeholder = |trade| RateEdge {
            weight: f64::INFINITY,
            depth: Some(f64::INFINITY),
            market: symbol.clone(),
            exchange: exchange.clone(),
            trade,
            fee: taker_fee,
            no_fee_rate: f64::NEG_INFINITY,
            volume: Some(0.0),
        };
        self.upsert_edge(symbol.base(), symbol.quote(), placeholder(TradeType::Sell));
        self.upsert_edge(symbol.quote(), symbol.base(), placeholder(TradeType::Buy));
    }

    /// Apply one pushed top-of-book update.
    ///
    /// A bid update rewrites the sell edge, an ask update the buy edge.
    /// Returns `true` when the new rate beats the edge's previous rate,
    /// i.e. an opportunity could newly exist. Returns `false` for
    /// markets never seeded via [`add_placeholder_market`] or a builder.
    pub fn apply_quote(&mut self, symbol: &Symbol, side: QuoteSide, price: f64, volume: f64) -> bool {
        let (from, to, rate, depth) = match side {
            QuoteSide::Bid => (symbol.base(), symbol.quote(), price, -volume.ln()),
            QuoteSide::Ask => (
                symbol.quote(),
                symbol.base(),
                1.0 / price,
                -(volume * price).ln(),
            ),
        };
        let Some(edge) = self.edge_mut(from, to) else {
            return false;
        };
        let fee_scalar = 1.0 - edge.fee;
        let improved = rate > edge.no_fee_rate;
        edge.weight = -(fee_scalar * rate).ln();
        edge.depth = Some(depth);
        edge.no_fee_rate = rate;
        edge.volume = Some(volume);
        improved
    }
}

/// Serializable form of a [`RateGraph`].
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub exchange: Option<ExchangeId>,
    pub timestamp: DateTime<Utc>,
    pub edges: Vec<EdgeSnapshot>,
}

/// Serializable form of one edge.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeSnapshot {
    pub from: String,
    pub to: String,
    pub market: String,
    pub exchange: ExchangeId,
    pub trade: String,
    pub weight: f64,
    pub depth: Option<f64>,
    pub fee: f64,
    pub no_fee_rate: f64,
    pub volume: Option<f64>,
}
