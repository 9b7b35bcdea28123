//! Negative-cycle search over a cross-venue multigraph.
//!
//! Before relaxation every parallel-edge bunch collapses to its
//! least-weight member (the best post-fee rate across venues). The
//! collapse pass doubles as the first relaxation round, so the main
//! loop runs `|V| - 2` more times.

use crate::error::{Error, Result};
use crate::finder::bellman::{Cycles, Tables};
use crate::graph::{RateGraph, RateMultiGraph};

/// Finder that owns the reduced graph produced by the pre-pass.
#[derive(Debug)]
pub struct MultiCycleFinder {
    reduced: RateGraph,
    tables: Tables,
}

impl MultiCycleFinder {
    /// Reduce `multi` and relax it from `source`.
    ///
    /// `source` must be a node of the multigraph. It may still be
    /// missing from the reduced graph (every bunch touching it was
    /// non-finite); the finder then yields nothing.
    pub fn new(multi: &RateMultiGraph, source: &str) -> Result<Self> {
        if !multi.has_node(source) {
            return Err(Error::UnknownSource(source.to_string()));
        }

        let mut reduced = RateGraph::new();
        let mut tables = Tables::new(0);
        let mut source_seeded = false;

        // Pre-pass: collapse each bunch and relax the surviving edge
        // immediately. This is the first relaxation round.
        for bunch in multi.bunches() {
            let Some(best) = bunch.least_weight_edge() else {
                continue;
            };
            reduced.upsert_edge(bunch.from, bunch.to, best.clone());
            tables.grow(reduced.node_count());
            if !source_seeded {
                if let Some(index) = reduced.node_index(source) {
                    tables.dist_to[index.index()] = 0.0;
                    source_seeded = true;
                }
            }
            // Both endpoints exist: upsert interned them just above.
            if let (Some(from), Some(to)) = (
                reduced.node_index(bunch.from),
                reduced.node_index(bunch.to),
            ) {
                tables.relax(from, to, best.weight);
            }
        }

        tables.run(&reduced, reduced.node_count().saturating_sub(2));
        Ok(Self { reduced, tables })
    }

    /// The plain digraph retained after reduction.
    #[must_use]
    pub fn reduced_graph(&self) -> &RateGraph {
        &self.reduced
    }

    /// Consume the finder, keeping the reduced graph.
    #[must_use]
    pub fn into_reduced_graph(self) -> RateGraph {
        self.reduced
    }

    /// Lazily yield negative cycles of the reduced graph.
    #[must_use]
    pub fn cycles(&self, unique_paths: bool) -> Cycles<'_> {
        Cycles::over(&self.reduced, &self.tables, unique_paths)
    }
}

/// Convenience for callers that only need the cycle list: reduce,
/// relax, collect.
pub fn bellman_ford_multi(
    multi: &RateMultiGraph,
    source: &str,
    unique_paths: bool,
) -> Result<(RateGraph, Vec<Vec<String>>)> {
    let finder = MultiCycleFinder::new(multi, source)?;
    let cycles = finder.cycles(unique_paths).collect();
    Ok((finder.into_reduced_graph(), cycles))
}
