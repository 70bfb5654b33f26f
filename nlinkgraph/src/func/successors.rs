/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::graphs::CsrGraph;
use crate::NodeId;

/// The successor map f_N of the N-link rule, as a flat array.
///
/// `succ[v]` is `targets[offsets[v] + N − 1]` when the outdegree of `v`
/// is at least N, and the [`halt`](FuncGraph::halt) sentinel (the number
/// of nodes, which is not a valid [`NodeId`]) otherwise. Derivation is a
/// single cache-friendly pass over the offsets; the result is
/// deterministic and may be discarded and rederived at will.
#[derive(Clone, Debug)]
pub struct FuncGraph {
    n: u32,
    halt: NodeId,
    succ: Box<[NodeId]>,
}

impl FuncGraph {
    /// Derives f_N from the snapshot graph.
    ///
    /// # Panics
    /// If `n` is zero: the N-link rule is defined for N ≥ 1. A zero N is
    /// a programming error here; layers accepting user input reject it
    /// first with [`InvalidRule`](crate::Error::InvalidRule).
    pub fn new(graph: &CsrGraph, n: u32) -> Self {
        assert!(n >= 1, "the N-link rule is defined for N ≥ 1");
        let num_nodes = graph.num_nodes();
        let halt = num_nodes as NodeId;
        let index = n as usize - 1;
        let mut succ = Vec::with_capacity(num_nodes);
        for node in 0..num_nodes as NodeId {
            let successors = graph.successors(node);
            succ.push(*successors.get(index).unwrap_or(&halt));
        }
        Self {
            n,
            halt,
            succ: succ.into_boxed_slice(),
        }
    }

    /// The rule parameter N.
    #[inline(always)]
    pub fn n(&self) -> u32 {
        self.n
    }

    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.succ.len()
    }

    /// The `HALT` sentinel: the number of nodes of the graph.
    #[inline(always)]
    pub fn halt(&self) -> NodeId {
        self.halt
    }

    /// Returns the successor of a node in sentinel form: a valid node, or
    /// [`halt`](FuncGraph::halt).
    #[inline(always)]
    pub fn successor(&self, node: NodeId) -> NodeId {
        self.succ[node as usize]
    }

    /// Returns the successor of a node, or `None` if the node halts.
    #[inline(always)]
    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        let succ = self.succ[node as usize];
        (succ != self.halt).then_some(succ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_selects_nth_slot() {
        let graph =
            CsrGraph::from_sequences(&[vec![1, 2], vec![0, 3], vec![3], vec![3, 4], vec![0]]);
        let f2 = FuncGraph::new(&graph, 2);
        assert_eq!(f2.successor(0), 2);
        assert_eq!(f2.successor(1), 3);
        assert_eq!(f2.successor(2), f2.halt());
        assert_eq!(f2.successor(3), 4);
        assert_eq!(f2.next(4), None);
    }

    #[test]
    fn test_outdegree_boundary() {
        // outdegree exactly N − 1 halts, outdegree exactly N does not
        let graph = CsrGraph::from_sequences(&[vec![1], vec![0, 0]]);
        let f2 = FuncGraph::new(&graph, 2);
        assert_eq!(f2.next(0), None);
        assert_eq!(f2.next(1), Some(0));
    }
}
