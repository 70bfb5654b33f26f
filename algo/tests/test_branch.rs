/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use dsi_progress_logger::prelude::*;
use nlinkgraph::func::{classify, Classification, FuncGraph, ReverseGraph, Terminal};
use nlinkgraph::graphs::CsrGraph;
use nlinkgraph::utils::CancelFlag;
use nlinkgraph::Error;
use nlinkgraph_algo::branch::{decompose, dominant_chain, Subtree};

fn layer(graph: &CsrGraph) -> Result<(Classification, ReverseGraph)> {
    let func = FuncGraph::new(graph, 1);
    let classification = classify(&func, &CancelFlag::new(), no_logging![])?;
    let reverse = ReverseGraph::new(&func, &CancelFlag::new(), no_logging![])?;
    Ok((classification, reverse))
}

/// A 2-cycle {0, 1} with a four-node tree entering at 0 through 2 and a
/// single leaf entering at 1 through 5:
/// 2 → 0, 3 → 2, 4 → 2, 6 → 3, 5 → 1.
fn tree_graph() -> CsrGraph {
    CsrGraph::from_sequences(&[
        vec![1],
        vec![0],
        vec![0],
        vec![2],
        vec![2],
        vec![1],
        vec![3],
    ])
}

#[test]
fn test_decompose_entries() -> Result<()> {
    let graph = tree_graph();
    let (classification, reverse) = layer(&graph)?;

    let branches = decompose(&reverse, &classification, 0, &CancelFlag::new())?;
    assert_eq!(branches.entry(), 0);
    assert_eq!(branches.subtrees(), &[Subtree { root: 2, size: 4 }]);
    assert_eq!(branches.total(), 4);
    assert_eq!(branches.dominance(), 1.0);
    assert_eq!(branches.gini(), 0.0);

    let branches = decompose(&reverse, &classification, 1, &CancelFlag::new())?;
    assert_eq!(branches.subtrees(), &[Subtree { root: 5, size: 1 }]);
    assert_eq!(branches.total(), 1);
    Ok(())
}

#[test]
fn test_branch_identity() -> Result<()> {
    // The branch totals over all entries cover the basin minus the cycle
    let graph = tree_graph();
    let (classification, reverse) = layer(&graph)?;
    let cycle = classification.cycle(0)?;
    let total: u64 = cycle
        .members()
        .iter()
        .map(|&entry| {
            decompose(&reverse, &classification, entry, &CancelFlag::new())
                .map(|branches| branches.total())
        })
        .sum::<nlinkgraph::Result<u64>>()?;
    let basin_size = (0..graph.num_nodes() as u32)
        .filter(|&node| classification.terminal(node) == Terminal::Cycle(0))
        .count() as u64;
    assert_eq!(total, basin_size - cycle.len() as u64);
    Ok(())
}

#[test]
fn test_decompose_requires_cycle_member() -> Result<()> {
    let graph = tree_graph();
    let (classification, reverse) = layer(&graph)?;
    assert!(matches!(
        decompose(&reverse, &classification, 2, &CancelFlag::new()),
        Err(Error::CycleNotFound { n: 1, cycle_id: 2 })
    ));
    Ok(())
}

#[test]
fn test_trunkiness_ordering_and_gini() -> Result<()> {
    // Entry 0 has two subtrees, of sizes 3 (through 2) and 1 (through 5)
    let graph = CsrGraph::from_sequences(&[
        vec![1],
        vec![0],
        vec![0],
        vec![2],
        vec![2],
        vec![0],
    ]);
    let (classification, reverse) = layer(&graph)?;
    let branches = decompose(&reverse, &classification, 0, &CancelFlag::new())?;
    assert_eq!(
        branches.subtrees(),
        &[Subtree { root: 2, size: 3 }, Subtree { root: 5, size: 1 }]
    );
    assert_eq!(branches.dominance(), 0.75);
    // Gini of [1, 3]: 2·(1·1 + 2·3)/(2·4) − 3/2 = 0.25
    assert!((branches.gini() - 0.25).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_dominant_chain() -> Result<()> {
    let graph = tree_graph();
    let (classification, reverse) = layer(&graph)?;

    let chain = dominant_chain(&reverse, &classification, 0, 0.5, &CancelFlag::new())?;
    let nodes: Vec<u32> = chain.iter().map(|step| step.node).collect();
    assert_eq!(nodes, vec![0, 2, 3]);
    assert_eq!(chain[0].dominance, 1.0);
    assert_eq!(chain[1].subtree_size, 4);
    assert_eq!(chain[1].dominance, 1.0);
    assert_eq!(chain[2].subtree_size, 2);
    assert!((chain[2].dominance - 2.0 / 3.0).abs() < 1e-12);

    // A higher threshold stops the chain before the 2/3 step
    let chain = dominant_chain(&reverse, &classification, 0, 0.7, &CancelFlag::new())?;
    let nodes: Vec<u32> = chain.iter().map(|step| step.node).collect();
    assert_eq!(nodes, vec![0, 2]);
    Ok(())
}

#[test]
fn test_dominant_chain_tie_break() -> Result<()> {
    // Two subtrees of equal size below node 0: the chain picks the
    // smaller node id
    let graph = CsrGraph::from_sequences(&[vec![0], vec![0], vec![0], vec![1], vec![2]]);
    let (classification, reverse) = layer(&graph)?;
    let chain = dominant_chain(&reverse, &classification, 0, 0.0, &CancelFlag::new())?;
    assert_eq!(chain[1].node, 1);
    assert_eq!(chain[1].subtree_size, 2);
    assert_eq!(chain[1].dominance, 0.5);
    Ok(())
}

#[test]
fn test_chain_on_leaf_seed() -> Result<()> {
    let graph = tree_graph();
    let (classification, reverse) = layer(&graph)?;
    let chain = dominant_chain(&reverse, &classification, 6, 0.0, &CancelFlag::new())?;
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].node, 6);
    assert_eq!(chain[0].subtree_size, 1);
    Ok(())
}
