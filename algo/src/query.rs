/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The point-query surface callable by any UI layer.
//!
//! Queries operate on dense node ids; mapping external page ids in and
//! out (and failing with [`NodeNotFound`](nlinkgraph::Error::NodeNotFound))
//! is the caller's concern, at the I/O boundary.

use crate::basin::{materialize, BasinOptions};
use crate::multiplex::{LayerMatrix, Multiplex};
use dsi_progress_logger::prelude::*;
use nlinkgraph::func::{Classification, FuncGraph, ReverseGraph, Terminal};
use nlinkgraph::utils::CancelFlag;
use nlinkgraph::{NodeId, Result};

/// The result of tracing a page under one rule.
#[derive(Clone, Debug)]
pub struct Trace {
    /// The first nodes of the trajectory, start included, capped at the
    /// requested prefix length.
    pub path: Vec<NodeId>,
    /// The terminal of the *full* trajectory, known from the
    /// classification even when the walk was cut short.
    pub terminal: Terminal,
    /// Rule applications performed before stopping. Equal to the depth of
    /// the start node for a complete walk into a cycle.
    pub steps: u32,
    /// Whether the walk stopped at `max_steps` before reaching the
    /// terminal.
    pub truncated: bool,
}

impl Trace {
    /// The terminal cycle id, if the trajectory does not halt.
    pub fn cycle_id(&self) -> Option<NodeId> {
        match self.terminal {
            Terminal::Cycle(cycle_id) => Some(cycle_id),
            Terminal::Halt => None,
        }
    }
}

/// Walks the trajectory of `start` under f_N until it enters its cycle,
/// reaches a halting node, or exceeds `max_steps`.
///
/// The recorded path keeps at most `path_prefix` nodes.
pub fn trace(
    func: &FuncGraph,
    classification: &Classification,
    start: NodeId,
    max_steps: u32,
    path_prefix: usize,
) -> Trace {
    let mut path = Vec::new();
    if path_prefix > 0 {
        path.push(start);
    }
    let mut cur = start;
    let mut steps = 0;
    let mut truncated = false;
    loop {
        if classification.is_cycle_member(cur) {
            break;
        }
        let Some(next) = func.next(cur) else {
            break;
        };
        if steps == max_steps {
            truncated = true;
            break;
        }
        cur = next;
        steps += 1;
        if path.len() < path_prefix {
            path.push(cur);
        }
    }
    Trace {
        path,
        terminal: classification.terminal(cur),
        steps,
        truncated,
    }
}

/// Streams the basin of a cycle as `(node, depth)` pairs in (depth, node)
/// order, optionally capped at `max_rows` (the cap truncates, it does not
/// fail).
pub fn basin_of(
    func: &FuncGraph,
    reverse: &ReverseGraph,
    classification: &Classification,
    cycle_id: NodeId,
    max_rows: Option<usize>,
    cancel: &CancelFlag,
) -> Result<impl Iterator<Item = (NodeId, u32)>> {
    let options = BasinOptions {
        budget: max_rows,
        strict: false,
        parents: false,
    };
    let basin = materialize(
        func,
        reverse,
        classification,
        cycle_id,
        &options,
        cancel,
        no_logging![],
    )?;
    Ok(basin.into_nodes().into_iter())
}

/// Lists the cycles of a classification as `(cycle_id, length)` pairs in
/// id order.
pub fn cycles(classification: &Classification) -> Vec<(NodeId, u32)> {
    classification
        .cycles()
        .iter()
        .map(|cycle| (cycle.id(), cycle.len() as u32))
        .collect()
}

/// Computes the layer-connectivity matrix of a multiplex; equivalent to
/// [`Multiplex::connectivity`] on a default pool.
pub fn layer_matrix(multiplex: &Multiplex, cancel: &CancelFlag) -> Result<LayerMatrix> {
    multiplex.connectivity(&crate::thread_pool![], cancel, no_logging![])
}
