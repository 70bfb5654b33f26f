/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::NodeId;

/// An immutable directed graph in compressed sparse row form.
///
/// For each node the targets of its outgoing links are stored as a
/// contiguous slice of [`NodeId`]s, *in the order the links appear in the
/// source article*; duplicates are preserved, as the N-link rule selects
/// the N-th slot, not the N-th distinct target. Targets are `u32` and
/// offsets `u64`, so the whole structure costs 4·E + 8·(V + 1) bytes.
///
/// The graph is immutable after construction and safe to share across
/// threads without synchronization.
#[derive(Clone, Debug)]
pub struct CsrGraph {
    /// `offsets[v]..offsets[v + 1]` delimits the successors of `v`.
    offsets: Box<[u64]>,
    targets: Box<[u32]>,
}

impl CsrGraph {
    /// Creates a graph from raw CSR arrays.
    ///
    /// # Panics
    /// In debug mode, if `offsets` is not monotone or does not end at
    /// `targets.len()`.
    pub(crate) fn new(offsets: Box<[u64]>, targets: Box<[u32]>) -> Self {
        debug_assert!(!offsets.is_empty());
        debug_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        debug_assert_eq!(*offsets.last().unwrap(), targets.len() as u64);
        Self { offsets, targets }
    }

    /// Creates a graph from explicit per-node link sequences.
    ///
    /// The number of sequences defines the number of nodes. Mostly useful
    /// in tests and examples; real snapshots come from
    /// [`snapshot::load`](crate::snapshot::load).
    ///
    /// # Panics
    /// If a target is not a valid node.
    pub fn from_sequences<S: AsRef<[NodeId]>>(sequences: &[S]) -> Self {
        let num_nodes = sequences.len();
        let mut offsets = Vec::with_capacity(num_nodes + 1);
        let mut targets = Vec::new();
        offsets.push(0);
        for sequence in sequences {
            for &target in sequence.as_ref() {
                assert!(
                    (target as usize) < num_nodes,
                    "target {} does not exist (the graph has {} nodes)",
                    target,
                    num_nodes,
                );
                targets.push(target);
            }
            offsets.push(targets.len() as u64);
        }
        Self::new(offsets.into_boxed_slice(), targets.into_boxed_slice())
    }

    /// Returns the number of nodes of the graph.
    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns the number of links of the graph.
    #[inline(always)]
    pub fn num_arcs(&self) -> u64 {
        self.targets.len() as u64
    }

    /// Returns the number of outgoing links of a node.
    #[inline(always)]
    pub fn outdegree(&self, node: NodeId) -> usize {
        (self.offsets[node as usize + 1] - self.offsets[node as usize]) as usize
    }

    /// Returns the ordered successors of a node.
    #[inline(always)]
    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        &self.targets[self.offsets[node as usize] as usize..self.offsets[node as usize + 1] as usize]
    }

    /// Returns an iterator over `(node, successors)` pairs in node order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[NodeId])> + '_ {
        (0..self.num_nodes() as NodeId).map(move |node| (node, self.successors(node)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sequences() {
        let g = CsrGraph::from_sequences(&[vec![1, 2], vec![0, 3], vec![3], vec![3, 4], vec![0]]);
        assert_eq!(g.num_nodes(), 5);
        assert_eq!(g.num_arcs(), 8);
        assert_eq!(g.successors(0), &[1, 2]);
        assert_eq!(g.successors(2), &[3]);
        assert_eq!(g.outdegree(4), 1);
    }

    #[test]
    fn test_empty_sequences() {
        let g = CsrGraph::from_sequences(&[vec![], vec![0u32]]);
        assert_eq!(g.num_nodes(), 2);
        assert_eq!(g.outdegree(0), 0);
        let empty: &[u32] = &[];
        assert_eq!(g.successors(0), empty);
        assert_eq!(g.successors(1), &[0]);
    }

    #[test]
    fn test_duplicate_slots_preserved() {
        let g = CsrGraph::from_sequences(&[vec![1, 1, 1], vec![]]);
        assert_eq!(g.successors(0), &[1, 1, 1]);
    }
}
