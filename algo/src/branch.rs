/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Branch decomposition at cycle-entry nodes.
//!
//! A cycle member with at least one non-cycle predecessor is an *entry*:
//! the part of the basin whose trajectories first touch the cycle there.
//! Because the reverse of a functional graph is a forest off the cycle,
//! the entry's branch splits into disjoint subtrees, one per immediate
//! non-cycle predecessor; their sizes ("trunkiness") measure how
//! concentrated the inflow is.

use nlinkgraph::func::{Classification, ReverseGraph};
use nlinkgraph::utils::{CancelFlag, CANCEL_GRANULARITY};
use nlinkgraph::{Error, NodeId, Result};
use std::collections::HashMap;

/// A depth-1 subtree of a cycle-entry node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subtree {
    /// The immediate predecessor rooting the subtree.
    pub root: NodeId,
    /// The number of nodes in the subtree, root included.
    pub size: u64,
}

/// The depth-1 decomposition of the branch entering a cycle at one node.
#[derive(Clone, Debug)]
pub struct Branches {
    entry: NodeId,
    /// Sorted by size descending, root ascending.
    subtrees: Vec<Subtree>,
    total: u64,
}

impl Branches {
    /// The cycle-entry node.
    #[inline(always)]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// The depth-1 subtrees, largest first.
    #[inline(always)]
    pub fn subtrees(&self) -> &[Subtree] {
        &self.subtrees
    }

    /// The branch size: the sum of all subtree sizes.
    #[inline(always)]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// The share of the largest subtree relative to the whole branch, in
    /// [0, 1]; 0 for an entry with no branch.
    pub fn dominance(&self) -> f64 {
        match self.subtrees.first() {
            Some(largest) if self.total > 0 => largest.size as f64 / self.total as f64,
            _ => 0.0,
        }
    }

    /// Gini concentration of the subtree sizes, in [0, 1); 0 for zero or
    /// one subtree.
    pub fn gini(&self) -> f64 {
        let n = self.subtrees.len();
        if n < 2 || self.total == 0 {
            return 0.0;
        }
        // Σ i·x_(i) over sizes sorted ascending, i 1-based
        let weighted: f64 = self
            .subtrees
            .iter()
            .rev()
            .enumerate()
            .map(|(index, subtree)| (index as f64 + 1.0) * subtree.size as f64)
            .sum();
        2.0 * weighted / (n as f64 * self.total as f64) - (n as f64 + 1.0) / n as f64
    }
}

/// Decomposes the branch of a cycle-entry node into its depth-1 subtrees.
///
/// Fails with [`CycleNotFound`](Error::CycleNotFound) if `entry` is not a
/// cycle member. Runs in O(|branch|).
pub fn decompose(
    reverse: &ReverseGraph,
    classification: &Classification,
    entry: NodeId,
    cancel: &CancelFlag,
) -> Result<Branches> {
    if !classification.is_cycle_member(entry) {
        return Err(Error::CycleNotFound {
            n: classification.n(),
            cycle_id: entry,
        });
    }
    let mut subtrees: Vec<Subtree> = Vec::new();
    let mut total = 0u64;
    let mut counted = 0usize;
    let mut stack: Vec<NodeId> = Vec::new();
    for &root in reverse.predecessors(entry) {
        // Skip the predecessor along the cycle itself
        if classification.is_cycle_member(root) {
            continue;
        }
        // The subtree is the reverse-reachable set of the root; it is a
        // tree, so no visited set is needed
        let mut size = 0u64;
        stack.push(root);
        while let Some(node) = stack.pop() {
            size += 1;
            counted += 1;
            if counted % CANCEL_GRANULARITY == 0 {
                cancel.check()?;
            }
            stack.extend_from_slice(reverse.predecessors(node));
        }
        subtrees.push(Subtree { root, size });
        total += size;
    }
    subtrees.sort_unstable_by(|a, b| b.size.cmp(&a.size).then(a.root.cmp(&b.root)));
    Ok(Branches {
        entry,
        subtrees,
        total,
    })
}

/// One step of a dominant upstream chain.
#[derive(Clone, Copy, Debug)]
pub struct ChainStep {
    pub node: NodeId,
    /// The size of the subtree rooted at this node.
    pub subtree_size: u64,
    /// The share of this subtree among all sibling subtrees of the step;
    /// 1 for the seed.
    pub dominance: f64,
}

/// Follows the "source of the Nile" upstream from a seed node.
///
/// At every step the chain moves to the predecessor with the largest
/// subtree, breaking ties by ascending node id, and records the step's
/// dominance ratio (the share of the chosen subtree among the sibling
/// subtrees of the step). It stops when the current node has no non-cycle
/// predecessor, when the best predecessor is trivial (a subtree of size
/// 1), or when the dominance ratio falls below `threshold`.
///
/// The seed may be any node, a cycle member included; predecessors along
/// the cycle are never followed. The chain is deterministic given the
/// tie-break rule.
pub fn dominant_chain(
    reverse: &ReverseGraph,
    classification: &Classification,
    seed: NodeId,
    threshold: f64,
    cancel: &CancelFlag,
) -> Result<Vec<ChainStep>> {
    let upstream = |node: NodeId| {
        reverse
            .predecessors(node)
            .iter()
            .copied()
            .filter(|&pred| !classification.is_cycle_member(pred))
    };

    // Subtree sizes for the whole upstream tree of the seed, computed by
    // accumulating in reverse discovery order (predecessors are always
    // discovered after their successor)
    let mut order: Vec<NodeId> = vec![seed];
    let mut cursor = 0;
    while cursor < order.len() {
        let node = order[cursor];
        cursor += 1;
        if cursor % CANCEL_GRANULARITY == 0 {
            cancel.check()?;
        }
        order.extend(upstream(node));
    }
    let mut size: HashMap<NodeId, u64> = HashMap::with_capacity(order.len());
    for &node in order.iter().rev() {
        let node_size = 1 + upstream(node).map(|pred| size[&pred]).sum::<u64>();
        size.insert(node, node_size);
    }

    let mut chain = vec![ChainStep {
        node: seed,
        subtree_size: size[&seed],
        dominance: 1.0,
    }];
    let mut cur = seed;
    loop {
        cancel.check()?;
        let candidates: Vec<NodeId> = upstream(cur).collect();
        if candidates.is_empty() {
            break;
        }
        let sibling_total: u64 = candidates.iter().map(|pred| size[pred]).sum();
        let (best_size, best) = candidates
            .iter()
            .map(|&pred| (size[&pred], pred))
            .max_by_key(|&(subtree_size, node)| (subtree_size, std::cmp::Reverse(node)))
            .unwrap();
        if best_size == 1 {
            // Only trivial predecessors are left
            break;
        }
        let dominance = best_size as f64 / sibling_total as f64;
        if dominance < threshold {
            break;
        }
        chain.push(ChainStep {
            node: best,
            subtree_size: best_size,
            dominance,
        });
        cur = best;
    }
    Ok(chain)
}
