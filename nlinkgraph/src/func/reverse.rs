/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::FuncGraph;
use crate::error::Result;
use crate::utils::{CancelFlag, CANCEL_GRANULARITY};
use crate::NodeId;
use dsi_progress_logger::prelude::*;

/// The predecessor lists of a functional graph, in CSR form.
///
/// This is the transpose of f_N, *not* of the original multi-edge graph:
/// `predecessors(v)` is `{u : f_N(u) = v}`. Built from the successor
/// array with a linear count-then-scatter; since the scatter scans nodes
/// in ascending order, every predecessor list comes out sorted, which
/// keeps reverse visits independent of construction schedule.
///
/// Building the reverse CSR is the expensive side of basin work; it
/// should be built once per N and shared across all basins materialized
/// at that N.
#[derive(Clone, Debug)]
pub struct ReverseGraph {
    offsets: Box<[u64]>,
    preds: Box<[NodeId]>,
}

impl ReverseGraph {
    pub fn new(func: &FuncGraph, cancel: &CancelFlag, pl: &mut impl ProgressLog) -> Result<Self> {
        let num_nodes = func.num_nodes();
        let halt = func.halt();
        pl.item_name("node");
        pl.expected_updates(Some(num_nodes * 2));
        pl.start(format!("Transposing f_{}...", func.n()));

        let mut offsets = vec![0u64; num_nodes + 1];
        for node in 0..num_nodes as NodeId {
            let succ = func.successor(node);
            if succ != halt {
                offsets[succ as usize + 1] += 1;
            }
            pl.light_update();
            if node as usize % CANCEL_GRANULARITY == CANCEL_GRANULARITY - 1 {
                cancel.check()?;
            }
        }
        for node in 0..num_nodes {
            offsets[node + 1] += offsets[node];
        }

        let mut cursor: Vec<u64> = offsets[..num_nodes].to_vec();
        let mut preds = vec![0 as NodeId; *offsets.last().unwrap() as usize].into_boxed_slice();
        for node in 0..num_nodes as NodeId {
            let succ = func.successor(node);
            if succ != halt {
                let slot = &mut cursor[succ as usize];
                preds[*slot as usize] = node;
                *slot += 1;
            }
            pl.light_update();
            if node as usize % CANCEL_GRANULARITY == CANCEL_GRANULARITY - 1 {
                cancel.check()?;
            }
        }
        pl.done();

        Ok(Self {
            offsets: offsets.into_boxed_slice(),
            preds,
        })
    }

    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns the number of predecessors of a node under f_N.
    #[inline(always)]
    pub fn indegree(&self, node: NodeId) -> usize {
        (self.offsets[node as usize + 1] - self.offsets[node as usize]) as usize
    }

    /// Returns the predecessors of a node under f_N, in ascending order.
    #[inline(always)]
    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        &self.preds[self.offsets[node as usize] as usize..self.offsets[node as usize + 1] as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::CsrGraph;

    #[test]
    fn test_transpose() -> Result<()> {
        let graph =
            CsrGraph::from_sequences(&[vec![1, 2], vec![0, 3], vec![3], vec![3, 4], vec![0]]);
        let f1 = FuncGraph::new(&graph, 1);
        // f_1 = {0→1, 1→0, 2→3, 3→3, 4→0}
        let reverse = ReverseGraph::new(&f1, &CancelFlag::new(), no_logging![])?;
        assert_eq!(reverse.predecessors(0), &[1, 4]);
        assert_eq!(reverse.predecessors(1), &[0]);
        let empty: &[u32] = &[];
        assert_eq!(reverse.predecessors(2), empty);
        assert_eq!(reverse.predecessors(3), &[2, 3]);
        assert_eq!(reverse.indegree(4), 0);
        Ok(())
    }

    #[test]
    fn test_halting_nodes_have_no_arc() -> Result<()> {
        let graph = CsrGraph::from_sequences(&[vec![1], vec![]]);
        let f1 = FuncGraph::new(&graph, 1);
        let reverse = ReverseGraph::new(&f1, &CancelFlag::new(), no_logging![])?;
        assert_eq!(reverse.predecessors(1), &[0]);
        assert_eq!(reverse.indegree(0), 0);
        Ok(())
    }
}
