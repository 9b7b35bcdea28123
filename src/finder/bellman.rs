//! Bellman–Ford negative-cycle search over a rate graph.
//!
//! The distance and predecessor tables are plain vectors indexed by
//! `NodeIndex`; one predecessor per node is sufficient for the standard
//! relaxation. Cycles are yielded lazily: relaxation runs once up
//! front, then each candidate edge from the detection pass is examined
//! only as the iterator advances.

use std::collections::HashSet;
use std::ops::Range;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::{Error, Result};
use crate::graph::RateGraph;

/// Distance/predecessor state shared by every finder variant.
#[derive(Debug, Clone)]
pub(crate) struct Tables {
    pub dist_to: Vec<f64>,
    pub pred_to: Vec<Option<NodeIndex>>,
}

impl Tables {
    pub fn new(node_count: usize) -> Self {
        Self {
            dist_to: vec![f64::INFINITY; node_count],
            pred_to: vec![None; node_count],
        }
    }

    /// Grow the tables to cover newly interned nodes.
    pub fn grow(&mut self, node_count: usize) {
        if node_count > self.dist_to.len() {
            self.dist_to.resize(node_count, f64::INFINITY);
            self.pred_to.resize(node_count, None);
        }
    }

    /// Relax one edge, recording the predecessor on improvement.
    pub fn relax(&mut self, from: NodeIndex, to: NodeIndex, weight: f64) -> bool {
        let candidate = self.dist_to[from.index()] + weight;
        if candidate < self.dist_to[to.index()] {
            self.dist_to[to.index()] = candidate;
            self.pred_to[to.index()] = Some(from);
            true
        } else {
            false
        }
    }

    /// Relax every edge once, in the graph's edge order. Returns
    /// whether anything improved.
    pub fn relax_pass(&mut self, graph: &RateGraph) -> bool {
        let mut updated = false;
        for edge in graph.petgraph().edge_references() {
            updated |= self.relax(edge.source(), edge.target(), edge.weight().weight);
        }
        updated
    }

    /// Relax until the fixpoint, at most `|V| - 1` passes.
    pub fn run(&mut self, graph: &RateGraph, remaining_passes: usize) {
        for _ in 0..remaining_passes {
            if !self.relax_pass(graph) {
                break;
            }
        }
    }
}

/// Prepare tables for `graph` with `dist_to[source] = 0`.
///
/// Signals [`Error::UnknownSource`] when `source` is not a node.
pub(crate) fn tables_for(graph: &RateGraph, source: &str) -> Result<Tables> {
    let source = graph
        .node_index(source)
        .ok_or_else(|| Error::UnknownSource(source.to_string()))?;
    let mut tables = Tables::new(graph.node_count());
    tables.dist_to[source.index()] = 0.0;
    Ok(tables)
}

/// Outcome of one predecessor-walk retrace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Retrace {
    /// A closed negative loop; first and last node are equal, the rest
    /// are distinct.
    Cycle(Vec<NodeIndex>),
    /// The walk touched a node already claimed by an earlier cycle
    /// (unique-path mode), or dead-ended before closing.
    Skipped,
}

/// Walk `pred_to` backwards from `start` until some node recurs, then
/// cut the closed loop out of the walk and return it in trade order.
///
/// In unique-path mode every walked node (the start included) is
/// recorded in `seen`; a walk that begins at or crosses a seen node is
/// skipped, which keeps yielded cycles pairwise node-disjoint.
pub(crate) fn retrace(
    pred_to: &[Option<NodeIndex>],
    start: NodeIndex,
    seen: &mut HashSet<NodeIndex>,
    unique_paths: bool,
) -> Retrace {
    if unique_paths && seen.contains(&start) {
        return Retrace::Skipped;
    }

    // walk[i + 1] is the predecessor of walk[i], so graph edges run
    // walk[i + 1] -> walk[i].
    let mut walk = vec![start];
    if unique_paths {
        seen.insert(start);
    }
    loop {
        let current = walk[walk.len() - 1];
        let Some(prev) = pred_to[current.index()] else {
            return Retrace::Skipped;
        };
        if let Some(position) = walk.iter().position(|&node| node == prev) {
            let mut cycle = Vec::with_capacity(walk.len() - position + 1);
            cycle.push(prev);
            cycle.extend(walk[position + 1..].iter().rev().copied());
            cycle.push(prev);
            return Retrace::Cycle(cycle);
        }
        if unique_paths && seen.contains(&prev) {
            return Retrace::Skipped;
        }
        walk.push(prev);
        if unique_paths {
            seen.insert(prev);
        }
    }
}

/// Resolve a retraced index cycle back to currency names.
pub(crate) fn name_cycle(graph: &RateGraph, cycle: &[NodeIndex]) -> Vec<String> {
    cycle
        .iter()
        .map(|&index| graph.currency(index).to_string())
        .collect()
}

/// Plain negative-cycle finder: volume-blind Bellman–Ford.
#[derive(Debug)]
pub struct NegativeCycleFinder<'g> {
    graph: &'g RateGraph,
    tables: Tables,
}

impl<'g> NegativeCycleFinder<'g> {
    /// Relax the graph from `source`.
    pub fn new(graph: &'g RateGraph, source: &str) -> Result<Self> {
        let mut tables = tables_for(graph, source)?;
        tables.run(graph, graph.node_count().saturating_sub(1));
        Ok(Self { graph, tables })
    }

    /// Lazily yield negative cycles found by the detection pass.
    ///
    /// With `unique_paths`, no two yielded cycles share a node. For a
    /// fixed graph and source the sequence is deterministic: candidates
    /// are examined in edge insertion order.
    #[must_use]
    pub fn cycles(&self, unique_paths: bool) -> Cycles<'_> {
        Cycles::over(self.graph, &self.tables, unique_paths)
    }
}

/// Lazy iterator over the negative cycles of one relaxed graph.
#[derive(Debug)]
pub struct Cycles<'a> {
    graph: &'a RateGraph,
    dist_to: &'a [f64],
    pred_to: &'a [Option<NodeIndex>],
    unique_paths: bool,
    seen: HashSet<NodeIndex>,
    candidates: Range<usize>,
}

impl<'a> Cycles<'a> {
    pub(crate) fn over(graph: &'a RateGraph, tables: &'a Tables, unique_paths: bool) -> Self {
        Self {
            graph,
            dist_to: &tables.dist_to,
            pred_to: &tables.pred_to,
            unique_paths,
            seen: HashSet::new(),
            candidates: 0..graph.edge_count(),
        }
    }
}

impl Iterator for Cycles<'_> {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let petgraph = self.graph.petgraph();
        for index in self.candidates.by_ref() {
            let edge = EdgeIndex::new(index);
            let Some((from, to)) = petgraph.edge_endpoints(edge) else {
                continue;
            };
            let weight = petgraph[edge].weight;
            // An edge that still relaxes after |V| - 1 passes proves a
            // negative cycle is reachable through its target.
            if self.dist_to[from.index()] + weight < self.dist_to[to.index()] {
                match retrace(self.pred_to, to, &mut self.seen, self.unique_paths) {
                    Retrace::Cycle(cycle) => return Some(name_cycle(self.graph, &cycle)),
                    Retrace::Skipped => continue,
                }
            }
        }
        None
    }
}
