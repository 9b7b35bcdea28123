//! Depth-aware negative-cycle search.
//!
//! Relaxation is identical to the plain finder; the retrace
//! additionally folds per-edge depths into the bottleneck volume the
//! cycle can absorb, expressed in the cycle's starting currency.

use std::collections::HashSet;
use std::ops::Range;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::error::Result;
use crate::finder::bellman::{name_cycle, retrace, tables_for, Retrace, Tables};
use crate::graph::RateGraph;

/// Negative-cycle finder that reports how much of the starting
/// currency fits through the cycle.
#[derive(Debug)]
pub struct DepthCycleFinder<'g> {
    graph: &'g RateGraph,
    tables: Tables,
}

impl<'g> DepthCycleFinder<'g> {
    /// Relax the graph from `source`.
    pub fn new(graph: &'g RateGraph, source: &str) -> Result<Self> {
        let mut tables = tables_for(graph, source)?;
        tables.run(graph, graph.node_count().saturating_sub(1));
        Ok(Self { graph, tables })
    }

    /// Lazily yield `(cycle, volume)` pairs, where `volume` is the
    /// largest amount of `cycle[0]`'s currency that can flow through
    /// without exceeding any edge's depth.
    #[must_use]
    pub fn cycles(&self, unique_paths: bool) -> DepthCycles<'_> {
        DepthCycles {
            graph: self.graph,
            dist_to: &self.tables.dist_to,
            pred_to: &self.tables.pred_to,
            unique_paths,
            seen: HashSet::new(),
            candidates: 0..self.graph.edge_count(),
        }
    }
}

/// Fold the bottleneck over a closed cycle.
///
/// Walking the cycle's edges from last to first keeps `minimum`
/// denominated in the source currency of the edge under inspection;
/// once the first edge is folded in, `minimum` is in `cycle[0]` units.
/// An edge strictly tighter than the running bound replaces it with its
/// own depth; a looser edge translates the bound across its rate.
fn cycle_bottleneck(graph: &RateGraph, cycle: &[NodeIndex]) -> f64 {
    let petgraph = graph.petgraph();
    let edge_between = |from: NodeIndex, to: NodeIndex| {
        petgraph
            .find_edge(from, to)
            .map(|index| &petgraph[index])
    };

    let mut minimum = f64::NEG_INFINITY;
    let mut seeded = false;
    for pair in cycle.windows(2).rev() {
        let Some(edge) = edge_between(pair[0], pair[1]) else {
            continue;
        };
        let depth = edge.depth_or_unbounded();
        if !seeded {
            minimum = depth;
            seeded = true;
            continue;
        }
        let through = edge.weight + depth;
        if through < minimum {
            minimum = (minimum - edge.weight).max(depth);
        } else if through > minimum {
            minimum = depth;
        }
    }
    minimum
}

/// Lazy iterator over `(cycle, starting volume)` pairs.
#[derive(Debug)]
pub struct DepthCycles<'a> {
    graph: &'a RateGraph,
    dist_to: &'a [f64],
    pred_to: &'a [Option<NodeIndex>],
    unique_paths: bool,
    seen: HashSet<NodeIndex>,
    candidates: Range<usize>,
}

impl Iterator for DepthCycles<'_> {
    type Item = (Vec<String>, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let petgraph = self.graph.petgraph();
        for index in self.candidates.by_ref() {
            let edge = EdgeIndex::new(index);
            let Some((from, to)) = petgraph.edge_endpoints(edge) else {
                continue;
            };
            let weight = petgraph[edge].weight;
            if self.dist_to[from.index()] + weight < self.dist_to[to.index()] {
                match retrace(self.pred_to, to, &mut self.seen, self.unique_paths) {
                    Retrace::Cycle(cycle) => {
                        let volume = (-cycle_bottleneck(self.graph, &cycle)).exp();
                        return Some((name_cycle(self.graph, &cycle), volume));
                    }
                    Retrace::Skipped => continue,
                }
            }
        }
        None
    }
}

/// The largest amount of `path[0]`'s currency that can be pushed down
/// `path` without any edge's depth binding, computed by forward
/// simulation at NO-FEE rates.
///
/// Returns `None` when the path is shorter than one edge or references
/// a missing edge.
#[must_use]
pub fn starting_volume(graph: &RateGraph, path: &[String]) -> Option<f64> {
    let first = graph.edge(path.first()?, path.get(1)?)?;
    let mut starting = (-first.depth_or_unbounded()).exp();
    let mut amount = starting;

    for pair in path.windows(2) {
        let edge = graph.edge(&pair[0], &pair[1])?;
        let capacity = (-edge.depth_or_unbounded()).exp();
        if amount > capacity {
            starting *= capacity / amount;
            amount = capacity;
        }
        amount *= edge.no_fee_rate;
    }
    Some(starting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testkit::{graph_from_depth_edges, DepthEdge};

    fn simple_edges() -> Vec<DepthEdge> {
        vec![
            // tail, head, no-fee rate, depth in tail-currency units
            DepthEdge::sell("A", "B", 2.0, 3.0),
            DepthEdge::sell("B", "C", 3.0, 4.0),
            DepthEdge::sell("C", "A", 1.0 / 5.0, 14.0),
        ]
    }

    fn long_edges() -> Vec<DepthEdge> {
        vec![
            DepthEdge::sell("A", "B", 2.0, 3.0),
            DepthEdge::sell("B", "C", 3.0, 4.0),
            DepthEdge::sell("C", "D", 7.0, 10.0),
            DepthEdge::sell("D", "E", 5.0, 40.0),
            DepthEdge::sell("E", "F", 1.0 / 5.0, 220.0),
            DepthEdge::sell("F", "G", 6.0, 40.0),
            DepthEdge::sell("G", "H", 1.0 / 20.0, 200.0),
            DepthEdge::sell("H", "A", 1.0 / 2.0, 20.0),
        ]
    }

    #[test]
    fn starting_volume_limited_once() {
        let graph = graph_from_depth_edges(&simple_edges(), 0.0);
        let path: Vec<String> = ["A", "B", "C", "A"].iter().map(|s| s.to_string()).collect();
        // 3 A available, but B->C only absorbs 4 of the 6 B produced.
        let volume = starting_volume(&graph, &path).unwrap();
        assert!((volume - 3.0 * (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn starting_volume_limited_repeatedly() {
        let graph = graph_from_depth_edges(&long_edges(), 0.0);
        let path: Vec<String> = ["A", "B", "C", "D", "E", "F", "G", "H", "A"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let expected = 3.0 * (2.0 / 3.0) * (5.0 / 6.0) * (4.0 / 7.0) * (5.0 / 6.0);
        let volume = starting_volume(&graph, &path).unwrap();
        assert!((volume - expected).abs() < 1e-9);
    }

    #[test]
    fn starting_volume_respects_every_depth() {
        let graph = graph_from_depth_edges(&long_edges(), 0.0);
        let path: Vec<String> = ["A", "B", "C", "D", "E", "F", "G", "H", "A"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut amount = starting_volume(&graph, &path).unwrap();

        for pair in path.windows(2) {
            let edge = graph.edge(&pair[0], &pair[1]).unwrap();
            let capacity = (-edge.depth.unwrap()).exp();
            assert!(amount <= capacity + 1e-9, "{} -> {} exceeded", pair[0], pair[1]);
            amount *= edge.no_fee_rate;
        }
    }

    #[test]
    fn depth_finder_yields_bounded_volume() {
        let graph = graph_from_depth_edges(&long_edges(), 0.0);
        let finder = DepthCycleFinder::new(&graph, "G").unwrap();
        let found: Vec<_> = finder.cycles(true).collect();

        assert_eq!(found.len(), 1);
        let (cycle, volume) = &found[0];
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.len() > 2);
        assert!(*volume > 0.0);

        // Fee-free, the finder's bottleneck matches the forward
        // simulation exactly.
        let simulated = starting_volume(&graph, cycle).unwrap();
        assert!((volume - simulated).abs() < 1e-9);

        // And the volume saturates at least one edge along the cycle.
        let mut amount = *volume;
        let mut saturated = 0;
        for pair in cycle.windows(2) {
            let edge = graph.edge(&pair[0], &pair[1]).unwrap();
            let capacity = (-edge.depth.unwrap()).exp();
            assert!(amount <= capacity + 1e-8);
            if (capacity - amount).abs() < 1e-8 {
                saturated += 1;
            }
            amount *= edge.no_fee_rate;
        }
        assert!(saturated > 0);
    }

    #[test]
    fn depth_cycle_with_fees_still_sums_negative() {
        let graph = graph_from_depth_edges(&simple_edges(), 0.01);
        let finder = DepthCycleFinder::new(&graph, "A").unwrap();
        for (cycle, volume) in finder.cycles(false) {
            let total: f64 = cycle
                .windows(2)
                .map(|pair| graph.edge(&pair[0], &pair[1]).unwrap().weight)
                .sum();
            assert!(total < 0.0);
            assert!(volume > 0.0);
        }
    }

    #[test]
    fn no_cycle_when_depth_graph_is_unprofitable() {
        let edges = vec![
            DepthEdge::sell("A", "B", 2.0, 3.0),
            DepthEdge::sell("B", "C", 3.0, 4.0),
            DepthEdge::sell("C", "A", 1.0 / 7.0, 14.0),
        ];
        let graph = graph_from_depth_edges(&edges, 0.0);
        let finder = DepthCycleFinder::new(&graph, "A").unwrap();
        assert_eq!(finder.cycles(false).count(), 0);
    }

    #[test]
    fn unknown_source_is_signaled() {
        let graph = graph_from_depth_edges(&simple_edges(), 0.0);
        let error = DepthCycleFinder::new(&graph, "Z").unwrap_err();
        assert!(matches!(error, Error::UnknownSource(_)));
    }

    #[test]
    fn missing_edge_fails_starting_volume() {
        let graph = graph_from_depth_edges(&simple_edges(), 0.0);
        let path: Vec<String> = ["A", "C"].iter().map(|s| s.to_string()).collect();
        assert!(starting_volume(&graph, &path).is_none());
    }
}
