/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The cross-N multiplex: per-layer terminal assignments and the
//! artifacts derived from them.
//!
//! Each N in the configured set is one *layer*; a (page, N) pair is
//! linked to a (page, N′) pair by shared page identity. Layers are
//! independent, so building them is an embarrassingly parallel map over
//! the N set; results are assembled in N order, so worker completion
//! order never leaks into an output.

use dsi_progress_logger::prelude::*;
use itertools::Itertools;
use nlinkgraph::func::{classify, Classification, FuncGraph, Terminal};
use nlinkgraph::graphs::CsrGraph;
use nlinkgraph::utils::{CancelFlag, CANCEL_GRANULARITY};
use nlinkgraph::{Error, NodeId, Result};
use rayon::prelude::*;

/// The per-N classifications of a snapshot for a set of N values, in
/// ascending N order.
#[derive(Debug)]
pub struct Multiplex {
    num_nodes: usize,
    layers: Vec<(u32, Classification)>,
}

/// One row of the multiplex assignment table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub node: NodeId,
    pub n: u32,
    pub terminal: Terminal,
    /// `None` for HALT-terminating assignments.
    pub depth: Option<u32>,
}

/// How a tunnel node moves between cycles as N grows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TunnelKind {
    /// The cycle assignment changes at most once over ascending N.
    Progressive,
    /// The cycle assignment flips more than once.
    Alternating,
}

impl TunnelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelKind::Progressive => "progressive",
            TunnelKind::Alternating => "alternating",
        }
    }
}

/// A node whose terminal cycle differs across layers.
#[derive(Clone, Copy, Debug)]
pub struct TunnelNode {
    pub node: NodeId,
    /// Number of distinct terminal cycles over the layers.
    pub distinct_cycles: u32,
    /// Number of cycle changes over ascending N, HALT layers skipped.
    pub transitions: u32,
    /// Importance score; see [`Multiplex::tunnels`].
    pub score: f64,
    pub kind: TunnelKind,
}

/// The layer-connectivity matrix: for every ordered pair of layers, how
/// many pages keep the same terminal identity and how many change it.
///
/// HALT counts as an identity of its own, so the two counts of every cell
/// partition the node set.
#[derive(Clone, Debug)]
pub struct LayerMatrix {
    n_set: Vec<u32>,
    same: Vec<u64>,
    diff: Vec<u64>,
}

impl LayerMatrix {
    #[inline(always)]
    pub fn n_set(&self) -> &[u32] {
        &self.n_set
    }

    /// Returns `(same_cycle_count, diff_cycle_count)` for the ordered
    /// pair of layer indexes `(source, destination)`.
    pub fn counts(&self, source: usize, destination: usize) -> (u64, u64) {
        let cell = source * self.n_set.len() + destination;
        (self.same[cell], self.diff[cell])
    }

    /// Iterates over `(n_src, n_dst, same_cycle_count, diff_cycle_count)`
    /// rows in (n_src, n_dst) order.
    pub fn rows(&self) -> impl Iterator<Item = (u32, u32, u64, u64)> + '_ {
        let k = self.n_set.len();
        (0..k)
            .cartesian_product(0..k)
            .map(move |(source, destination)| {
                let (same, diff) = self.counts(source, destination);
                (self.n_set[source], self.n_set[destination], same, diff)
            })
    }
}

impl Multiplex {
    /// Classifies the snapshot under every N of `n_set`, in parallel on
    /// the given pool.
    ///
    /// The N set is deduplicated and sorted; it must not be empty, and
    /// every N must be at least 1 ([`InvalidRule`](Error::InvalidRule)
    /// otherwise).
    pub fn build(
        graph: &CsrGraph,
        n_set: &[u32],
        pool: &rayon::ThreadPool,
        cancel: &CancelFlag,
        pl: &mut impl ProgressLog,
    ) -> Result<Self> {
        let mut n_set: Vec<u32> = n_set.to_vec();
        n_set.sort_unstable();
        n_set.dedup();
        assert!(!n_set.is_empty(), "the N set must not be empty");
        if n_set[0] < 1 {
            return Err(Error::InvalidRule(n_set[0]));
        }

        pl.item_name("layer");
        pl.expected_updates(Some(n_set.len()));
        pl.start(format!("Classifying {} layers...", n_set.len()));
        let layers: Vec<(u32, Classification)> = pool.install(|| {
            n_set
                .par_iter()
                .map(|&n| {
                    let func = FuncGraph::new(graph, n);
                    let classification = classify(&func, cancel, no_logging![])?;
                    log::info!(
                        "layer N={}: {} cycles, {} halting nodes",
                        n,
                        classification.cycles().num_cycles(),
                        classification.num_halting()
                    );
                    Ok((n, classification))
                })
                .collect::<Result<Vec<_>>>()
        })?;
        pl.done_with_count(layers.len());
        Self::from_layers(layers)
    }

    /// Assembles a multiplex from classifications computed elsewhere,
    /// e.g. by a controller that interleaves per-N artifact writing.
    ///
    /// Layers must be distinct and over the same node set; they are
    /// sorted by N.
    pub fn from_layers(mut layers: Vec<(u32, Classification)>) -> Result<Self> {
        assert!(!layers.is_empty(), "the N set must not be empty");
        layers.sort_by_key(|&(n, _)| n);
        assert!(
            layers.windows(2).all(|pair| pair[0].0 < pair[1].0),
            "duplicate layer"
        );
        let num_nodes = layers[0].1.num_nodes();
        assert!(
            layers
                .iter()
                .all(|(_, classification)| classification.num_nodes() == num_nodes),
            "layers over different node sets"
        );
        Ok(Self { num_nodes, layers })
    }

    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    #[inline(always)]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// The layers in ascending N order.
    pub fn layers(&self) -> impl Iterator<Item = (u32, &Classification)> {
        self.layers.iter().map(|(n, classification)| (*n, classification))
    }

    /// The classification of a single layer.
    pub fn layer(&self, n: u32) -> Option<&Classification> {
        self.layers
            .binary_search_by_key(&n, |&(layer_n, _)| layer_n)
            .ok()
            .map(|index| &self.layers[index].1)
    }

    /// Iterates over all `(node, N)` assignment rows, nodes outer and
    /// layers inner, i.e. in (node, N) order.
    pub fn assignments(&self) -> impl Iterator<Item = Assignment> + '_ {
        (0..self.num_nodes as NodeId).flat_map(move |node| {
            self.layers.iter().map(move |(n, classification)| Assignment {
                node,
                n: *n,
                terminal: classification.terminal(node),
                depth: classification.depth(node),
            })
        })
    }

    /// Extracts the tunnel nodes: nodes assigned to at least two distinct
    /// terminal cycles across the layers.
    ///
    /// The importance score is
    /// `n_distinct_cycles · ln(1 + n_transitions) · (constant / mean_depth)`,
    /// with the mean depth taken over cycle-terminal layers and clamped
    /// below at 1. The result is sorted by score descending, node
    /// ascending.
    pub fn tunnels(
        &self,
        score_constant: f64,
        cancel: &CancelFlag,
        pl: &mut impl ProgressLog,
    ) -> Result<Vec<TunnelNode>> {
        pl.item_name("node");
        pl.expected_updates(Some(self.num_nodes));
        pl.start("Extracting tunnel nodes...");

        let terminals: Vec<&[u32]> = self
            .layers
            .iter()
            .map(|(_, classification)| classification.terminals_raw())
            .collect();
        let halt = self.num_nodes as u32;
        let mut tunnels = Vec::new();
        let mut cycle_ids: Vec<u32> = Vec::with_capacity(self.layers.len());

        for node in 0..self.num_nodes {
            cycle_ids.clear();
            let mut depth_sum = 0u64;
            for (layer, (_, classification)) in self.layers.iter().enumerate() {
                let terminal = terminals[layer][node];
                if terminal != halt {
                    cycle_ids.push(terminal);
                    depth_sum += classification.depth(node as NodeId).unwrap() as u64;
                }
            }
            let transitions = cycle_ids
                .windows(2)
                .filter(|pair| pair[0] != pair[1])
                .count() as u32;
            let distinct = cycle_ids.iter().unique().count() as u32;
            if distinct >= 2 {
                let mean_depth = (depth_sum as f64 / cycle_ids.len() as f64).max(1.0);
                tunnels.push(TunnelNode {
                    node: node as NodeId,
                    distinct_cycles: distinct,
                    transitions,
                    score: distinct as f64
                        * (1.0 + transitions as f64).ln()
                        * (score_constant / mean_depth),
                    kind: if transitions <= 1 {
                        TunnelKind::Progressive
                    } else {
                        TunnelKind::Alternating
                    },
                });
            }
            pl.light_update();
            if node % CANCEL_GRANULARITY == CANCEL_GRANULARITY - 1 {
                cancel.check()?;
            }
        }
        pl.done();

        tunnels.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.node.cmp(&b.node))
        });
        Ok(tunnels)
    }

    /// Computes the layer-connectivity matrix, reducing over node chunks
    /// in parallel on the given pool.
    pub fn connectivity(
        &self,
        pool: &rayon::ThreadPool,
        cancel: &CancelFlag,
        pl: &mut impl ProgressLog,
    ) -> Result<LayerMatrix> {
        let k = self.layers.len();
        let terminals: Vec<&[u32]> = self
            .layers
            .iter()
            .map(|(_, classification)| classification.terminals_raw())
            .collect();
        pl.item_name("node");
        pl.expected_updates(Some(self.num_nodes));
        pl.start("Computing layer connectivity...");

        let (same, diff) = pool.install(|| {
            (0..self.num_nodes)
                .into_par_iter()
                .fold_chunks(
                    CANCEL_GRANULARITY.min(1 << 16),
                    || (vec![0u64; k * k], vec![0u64; k * k]),
                    |(mut same, mut diff), node| {
                        if cancel.is_cancelled() {
                            // Drain quickly; the error is raised below
                            return (same, diff);
                        }
                        for source in 0..k {
                            let source_terminal = terminals[source][node];
                            for destination in 0..k {
                                let cell = source * k + destination;
                                if source_terminal == terminals[destination][node] {
                                    same[cell] += 1;
                                } else {
                                    diff[cell] += 1;
                                }
                            }
                        }
                        (same, diff)
                    },
                )
                .reduce(
                    || (vec![0u64; k * k], vec![0u64; k * k]),
                    |(mut same_a, mut diff_a), (same_b, diff_b)| {
                        same_a
                            .iter_mut()
                            .zip(same_b)
                            .for_each(|(cell_a, cell_b)| *cell_a += cell_b);
                        diff_a
                            .iter_mut()
                            .zip(diff_b)
                            .for_each(|(cell_a, cell_b)| *cell_a += cell_b);
                        (same_a, diff_a)
                    },
                )
        });
        cancel.check()?;
        pl.done_with_count(self.num_nodes);

        Ok(LayerMatrix {
            n_set: self.layers.iter().map(|&(n, _)| n).collect(),
            same,
            diff,
        })
    }
}
