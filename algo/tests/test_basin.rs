/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use dsi_progress_logger::prelude::*;
use nlinkgraph::func::{classify, Classification, FuncGraph, ReverseGraph};
use nlinkgraph::graphs::CsrGraph;
use nlinkgraph::utils::CancelFlag;
use nlinkgraph::Error;
use nlinkgraph_algo::basin::{materialize, BasinOptions};

fn layer(graph: &CsrGraph, n: u32) -> Result<(FuncGraph, Classification, ReverseGraph)> {
    let func = FuncGraph::new(graph, n);
    let classification = classify(&func, &CancelFlag::new(), no_logging![])?;
    let reverse = ReverseGraph::new(&func, &CancelFlag::new(), no_logging![])?;
    Ok((func, classification, reverse))
}

#[test]
fn test_two_basins() -> Result<()> {
    let graph = CsrGraph::from_sequences(&[vec![1, 2], vec![0, 3], vec![3], vec![3, 4], vec![0]]);
    let (func, classification, reverse) = layer(&graph, 1)?;

    let basin = materialize(
        &func,
        &reverse,
        &classification,
        0,
        &BasinOptions::default(),
        &CancelFlag::new(),
        no_logging![],
    )?;
    assert_eq!(basin.cycle_id(), 0);
    assert_eq!(basin.nodes(), &[(0, 0), (1, 0), (4, 1)]);
    assert_eq!(basin.layers(), &[2, 1]);
    assert!(!basin.truncated());

    let basin = materialize(
        &func,
        &reverse,
        &classification,
        3,
        &BasinOptions::default(),
        &CancelFlag::new(),
        no_logging![],
    )?;
    assert_eq!(basin.nodes(), &[(3, 0), (2, 1)]);
    assert_eq!(basin.layers(), &[1, 1]);

    // Basins of distinct cycles are disjoint and, with the halting
    // nodes, partition the node set (here there are no halting nodes)
    Ok(())
}

#[test]
fn test_layer_sum_identity() -> Result<()> {
    let graph = CsrGraph::from_sequences(&[
        vec![1],
        vec![2],
        vec![0],
        vec![0],
        vec![3],
        vec![3],
        vec![5],
    ]);
    let (func, classification, reverse) = layer(&graph, 1)?;
    let basin = materialize(
        &func,
        &reverse,
        &classification,
        0,
        &BasinOptions::default(),
        &CancelFlag::new(),
        no_logging![],
    )?;
    assert_eq!(basin.len() as u64, basin.layers().iter().sum::<u64>());
    assert_eq!(basin.len(), 7);
    assert_eq!(basin.layers(), &[3, 1, 2, 1]);
    Ok(())
}

#[test]
fn test_parents() -> Result<()> {
    let graph = CsrGraph::from_sequences(&[vec![1, 2], vec![0, 3], vec![3], vec![3, 4], vec![0]]);
    let (func, classification, reverse) = layer(&graph, 1)?;
    let options = BasinOptions {
        parents: true,
        ..BasinOptions::default()
    };
    let basin = materialize(
        &func,
        &reverse,
        &classification,
        0,
        &options,
        &CancelFlag::new(),
        no_logging![],
    )?;
    // The reverse BFS discovers v from f_1(v); cycle members carry
    // themselves
    assert_eq!(basin.parents().unwrap(), &[0, 1, 0]);
    Ok(())
}

#[test]
fn test_budget_truncates_with_marker() -> Result<()> {
    let graph = CsrGraph::from_sequences(&[vec![0], vec![0], vec![0], vec![1], vec![1]]);
    let (func, classification, reverse) = layer(&graph, 1)?;
    let basin = materialize(
        &func,
        &reverse,
        &classification,
        0,
        &BasinOptions::with_budget(3),
        &CancelFlag::new(),
        no_logging![],
    )?;
    assert!(basin.truncated());
    assert_eq!(basin.len(), 3);
    assert_eq!(basin.layers().iter().sum::<u64>(), 3);
    Ok(())
}

#[test]
fn test_budget_strict_fails() -> Result<()> {
    let graph = CsrGraph::from_sequences(&[vec![0], vec![0], vec![0], vec![1], vec![1]]);
    let (func, classification, reverse) = layer(&graph, 1)?;
    let options = BasinOptions {
        budget: Some(3),
        strict: true,
        parents: false,
    };
    assert!(matches!(
        materialize(
            &func,
            &reverse,
            &classification,
            0,
            &options,
            &CancelFlag::new(),
            no_logging![],
        ),
        Err(Error::BudgetExceeded(3))
    ));
    Ok(())
}

#[test]
fn test_unknown_cycle() -> Result<()> {
    let graph = CsrGraph::from_sequences(&[vec![0]]);
    let (func, classification, reverse) = layer(&graph, 1)?;
    assert!(matches!(
        materialize(
            &func,
            &reverse,
            &classification,
            7,
            &BasinOptions::default(),
            &CancelFlag::new(),
            no_logging![],
        ),
        Err(Error::CycleNotFound { n: 1, cycle_id: 7 })
    ));
    Ok(())
}

#[test]
fn test_cancelled_between_levels() -> Result<()> {
    let graph = CsrGraph::from_sequences(&[vec![0], vec![0], vec![1]]);
    let (func, classification, reverse) = layer(&graph, 1)?;
    let cancel = CancelFlag::new();
    cancel.cancel();
    assert!(matches!(
        materialize(
            &func,
            &reverse,
            &classification,
            0,
            &BasinOptions::default(),
            &cancel,
            no_logging![],
        ),
        Err(Error::Cancelled)
    ));
    Ok(())
}

#[test]
fn test_million_node_star() -> Result<()> {
    // Synthetic star: node 0 loops on itself, every other node links to 0
    const NUM_NODES: usize = 1_000_000;
    let mut sequences = vec![vec![0u32]; NUM_NODES];
    sequences[0] = vec![0];
    let graph = CsrGraph::from_sequences(&sequences);
    let (func, classification, reverse) = layer(&graph, 1)?;

    assert_eq!(classification.cycles().num_cycles(), 1);
    let basin = materialize(
        &func,
        &reverse,
        &classification,
        0,
        &BasinOptions::default(),
        &CancelFlag::new(),
        no_logging![],
    )?;
    assert_eq!(basin.len(), NUM_NODES);
    assert_eq!(basin.layers(), &[1, (NUM_NODES - 1) as u64]);
    Ok(())
}
