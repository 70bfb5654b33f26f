/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Basin materialization by reverse reachability.
//!
//! The basin of a cycle is the inverse image of its members under all
//! iterates of f_N. Since the reverse of a functional graph is a forest
//! hanging off its cycles, the basin is enumerated by a reverse
//! breadth-first visit from the cycle members over the predecessor CSR,
//! level by level: level d contains exactly the nodes at depth d.
//!
//! The visit queue stores nodes as `Option<NonMaxU32>` with `None` acting
//! as a level separator, so no per-entry depth needs to be stored; the
//! visited set is a bit vector of size V.

use dsi_progress_logger::prelude::*;
use nlinkgraph::func::{Classification, FuncGraph, ReverseGraph};
use nlinkgraph::utils::CancelFlag;
use nlinkgraph::{Error, NodeId, Result};
use nonmax::NonMaxU32;
use std::collections::VecDeque;
use sux::prelude::BitVec;

/// Options for [`materialize`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BasinOptions {
    /// Soft cap on the number of basin members.
    pub budget: Option<usize>,
    /// If true, hitting the budget is a [`BudgetExceeded`](Error::BudgetExceeded)
    /// error; if false (default), the basin is truncated with a warning
    /// and marked as such.
    pub strict: bool,
    /// Record the reverse-BFS parent of every member. The visit discovers
    /// `v` from `f_N(v)`, so the parent of a member of depth ≥ 1 is its
    /// successor; cycle members carry themselves.
    pub parents: bool,
}

impl BasinOptions {
    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget: Some(budget),
            ..Self::default()
        }
    }
}

/// A materialized basin with its depth stratification.
#[derive(Clone, Debug)]
pub struct Basin {
    cycle_id: NodeId,
    /// `(node, depth)` pairs, sorted by (depth, node).
    nodes: Vec<(NodeId, u32)>,
    /// `layers[d]` is the number of members at depth d.
    layers: Vec<u64>,
    /// Parallel to `nodes` when parents were requested.
    parents: Option<Vec<NodeId>>,
    truncated: bool,
}

impl Basin {
    #[inline(always)]
    pub fn cycle_id(&self) -> NodeId {
        self.cycle_id
    }

    /// The number of members, cycle included.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The members with their depths, sorted by (depth, node).
    #[inline(always)]
    pub fn nodes(&self) -> &[(NodeId, u32)] {
        &self.nodes
    }

    /// The depth-stratified member counts; their sum is [`len`](Basin::len).
    #[inline(always)]
    pub fn layers(&self) -> &[u64] {
        &self.layers
    }

    /// The reverse-BFS parents, parallel to [`nodes`](Basin::nodes), if
    /// they were requested.
    #[inline(always)]
    pub fn parents(&self) -> Option<&[NodeId]> {
        self.parents.as_deref()
    }

    /// Whether the basin was cut short by the size budget.
    #[inline(always)]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Consumes the basin, returning the `(node, depth)` pairs.
    pub fn into_nodes(self) -> Vec<(NodeId, u32)> {
        self.nodes
    }
}

/// Materializes the basin of the given cycle.
///
/// Fails with [`CycleNotFound`](Error::CycleNotFound) if `cycle_id` is
/// not in the cycle table. Cancellation is checked between levels.
pub fn materialize(
    func: &FuncGraph,
    reverse: &ReverseGraph,
    classification: &Classification,
    cycle_id: NodeId,
    options: &BasinOptions,
    cancel: &CancelFlag,
    pl: &mut impl ProgressLog,
) -> Result<Basin> {
    let cycle = classification.cycle(cycle_id)?;
    let num_nodes = func.num_nodes();
    let budget = options.budget.unwrap_or(usize::MAX);

    pl.item_name("node");
    pl.expected_updates(None);
    pl.start(format!(
        "Materializing basin of cycle {} under f_{}...",
        cycle_id,
        func.n()
    ));

    let mut visited = BitVec::new(num_nodes);
    let mut queue: VecDeque<Option<NonMaxU32>> = VecDeque::new();
    let mut nodes: Vec<(NodeId, u32)> = Vec::new();
    let mut layers: Vec<u64> = Vec::new();
    let mut truncated = false;

    // Depth 0: the cycle members themselves
    let mut members = cycle.members().to_vec();
    members.sort_unstable();
    'fill: {
        for &member in &members {
            if nodes.len() >= budget {
                if options.strict {
                    pl.done();
                    return Err(Error::BudgetExceeded(budget));
                }
                truncated = true;
                break 'fill;
            }
            visited.set(member as usize, true);
            nodes.push((member, 0));
            queue.push_back(Some(
                NonMaxU32::new(member).expect("a node id is never u32::MAX"),
            ));
            pl.light_update();
        }
    }
    layers.push(nodes.len() as u64);

    let mut depth = 1u32;
    let mut level_start = nodes.len();
    if truncated {
        // The budget did not even cover the cycle: nothing to visit
        queue.clear();
        log::warn!("basin of cycle {} truncated at {} nodes", cycle_id, budget);
    }
    queue.push_back(None);

    'visit: while let Some(entry) = queue.pop_front() {
        match entry {
            Some(node) => {
                for &pred in reverse.predecessors(node.get()) {
                    // The only visited nodes reachable backwards are the
                    // cycle members
                    if visited[pred as usize] {
                        continue;
                    }
                    if nodes.len() >= budget {
                        if options.strict {
                            pl.done();
                            return Err(Error::BudgetExceeded(budget));
                        }
                        log::warn!(
                            "basin of cycle {} truncated at {} nodes",
                            cycle_id,
                            budget
                        );
                        truncated = true;
                        break 'visit;
                    }
                    visited.set(pred as usize, true);
                    nodes.push((pred, depth));
                    queue.push_back(Some(
                        NonMaxU32::new(pred).expect("a node id is never u32::MAX"),
                    ));
                    pl.light_update();
                }
            }
            None => {
                cancel.check()?;
                if nodes.len() == level_start {
                    break;
                }
                nodes[level_start..].sort_unstable();
                layers.push((nodes.len() - level_start) as u64);
                level_start = nodes.len();
                depth += 1;
                queue.push_back(None);
            }
        }
    }
    if truncated && nodes.len() > level_start {
        nodes[level_start..].sort_unstable();
        layers.push((nodes.len() - level_start) as u64);
    }
    pl.done();

    let parents = options.parents.then(|| {
        nodes
            .iter()
            .map(|&(node, depth)| if depth == 0 { node } else { func.successor(node) })
            .collect()
    });

    Ok(Basin {
        cycle_id,
        nodes,
        layers,
        parents,
        truncated,
    })
}
