//! The cross-venue rate multigraph and its reduction.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::graph::{RateEdge, RateGraph};

/// A directed graph of currencies where an ordered node pair may carry
/// several parallel edges, one per venue supplying that market.
#[derive(Debug, Clone, Default)]
pub struct RateMultiGraph {
    graph: DiGraph<String, RateEdge>,
    nodes: HashMap<String, NodeIndex>,
}

impl RateMultiGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, currency: &str) -> NodeIndex {
        if let Some(&index) = self.nodes.get(currency) {
            return index;
        }
        let index = self.graph.add_node(currency.to_string());
        self.nodes.insert(currency.to_string(), index);
        index
    }

    /// Append an edge `from -> to`; parallel edges accumulate.
    pub fn add_edge(&mut self, from: &str, to: &str, edge: RateEdge) {
        if from == to {
            return;
        }
        let from = self.intern(from);
        let to = self.intern(to);
        self.graph.add_edge(from, to, edge);
    }

    #[must_use]
    pub fn has_node(&self, currency: &str) -> bool {
        self.nodes.contains_key(currency)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All parallel edges `from -> to`, in insertion order.
    #[must_use]
    pub fn parallel_edges(&self, from: &str, to: &str) -> Vec<&RateEdge> {
        let (Some(&from), Some(&to)) = (self.nodes.get(from), self.nodes.get(to)) else {
            return Vec::new();
        };
        self.graph
            .edges_connecting(from, to)
            .map(|edge| edge.weight())
            .collect()
    }

    /// Group every edge into its ordered-pair bunch, bunches in
    /// first-encounter order so downstream passes stay deterministic.
    pub(crate) fn bunches(&self) -> Vec<EdgeBunch<'_>> {
        let mut order: Vec<(NodeIndex, NodeIndex)> = Vec::new();
        let mut grouped: HashMap<(NodeIndex, NodeIndex), Vec<&RateEdge>> = HashMap::new();
        for edge in self.graph.edge_references() {
            let key = (edge.source(), edge.target());
            let entry = grouped.entry(key).or_default();
            if entry.is_empty() {
                order.push(key);
            }
            entry.push(edge.weight());
        }
        order
            .into_iter()
            .map(|(source, target)| EdgeBunch {
                from: self.graph[source].as_str(),
                to: self.graph[target].as_str(),
                edges: grouped.remove(&(source, target)).unwrap_or_default(),
            })
            .collect()
    }

    /// Collapse every bunch to its least-weight edge, producing a plain
    /// rate graph. Bunches whose minimum weight is not finite (e.g.
    /// placeholder markets that never received a quote) are dropped.
    #[must_use]
    pub fn reduce(&self) -> RateGraph {
        let mut reduced = RateGraph::new();
        for bunch in self.bunches() {
            let Some(best) = bunch.least_weight_edge() else {
                continue;
            };
            reduced.upsert_edge(bunch.from, bunch.to, best.clone());
        }
        reduced
    }
}

/// All parallel edges between one ordered node pair.
pub(crate) struct EdgeBunch<'g> {
    pub from: &'g str,
    pub to: &'g str,
    pub edges: Vec<&'g RateEdge>,
}

impl<'g> EdgeBunch<'g> {
    /// The least-weight member, or `None` when even the best edge has
    /// non-finite weight.
    pub fn least_weight_edge(&self) -> Option<&'g RateEdge> {
        self.edges
            .iter()
            .copied()
            .min_by(|a, b| a.weight.total_cmp(&b.weight))
            .filter(|edge| edge.weight.is_finite())
    }
}
