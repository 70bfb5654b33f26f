/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::FuncGraph;
use crate::error::{Error, Result};
use crate::utils::{CancelFlag, CANCEL_GRANULARITY};
use crate::NodeId;
use dsi_progress_logger::prelude::*;

const WHITE: u8 = 0;
const GRAY: u8 = 1;
const BLACK: u8 = 2;

/// Depth sentinel for HALT-terminating nodes.
const DEPTH_HALT: u32 = u32::MAX;

/// The terminal of a trajectory: a cycle, or `HALT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    /// The trajectory enters the cycle with the given id.
    Cycle(NodeId),
    /// The trajectory reaches a node with no successor.
    Halt,
}

/// A maximal closed orbit under f_N.
///
/// The cycle id is the minimum [`NodeId`] of the orbit, a total function
/// of the orbit itself independent of traversal order; the member list
/// is in orbit order starting at the id.
#[derive(Clone, Debug)]
pub struct Cycle {
    id: NodeId,
    members: Vec<NodeId>,
}

impl Cycle {
    #[inline(always)]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The members in orbit order, starting at the id.
    #[inline(always)]
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }
}

/// All cycles of a functional graph, sorted by id.
#[derive(Clone, Debug, Default)]
pub struct CycleTable {
    cycles: Vec<Cycle>,
}

impl CycleTable {
    #[inline(always)]
    pub fn num_cycles(&self) -> usize {
        self.cycles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cycle> {
        self.cycles.iter()
    }

    /// Looks a cycle up by id.
    pub fn get(&self, cycle_id: NodeId) -> Option<&Cycle> {
        self.cycles
            .binary_search_by_key(&cycle_id, |cycle| cycle.id)
            .ok()
            .map(|index| &self.cycles[index])
    }

    /// The position of a cycle in the table, used to index parallel
    /// per-cycle arrays such as [`Classification::basin_sizes`].
    pub fn index_of(&self, cycle_id: NodeId) -> Option<usize> {
        self.cycles
            .binary_search_by_key(&cycle_id, |cycle| cycle.id)
            .ok()
    }
}

/// The complete terminal classification of a functional graph: for every
/// node, its terminal cycle (or `HALT`) and its depth, plus the cycle
/// table.
///
/// Invariants, for every node `v`:
/// - `v` is a cycle member iff its depth is 0;
/// - if `v` is in a basin but not on the cycle, `f_N(v)` has the same
///   terminal and depth one less;
/// - two nodes have the same cycle terminal iff they share a basin.
#[derive(Clone, Debug)]
pub struct Classification {
    n: u32,
    halt: NodeId,
    terminal: Box<[u32]>,
    depth: Box<[u32]>,
    cycles: CycleTable,
}

impl Classification {
    /// The rule parameter N this classification was computed for.
    #[inline(always)]
    pub fn n(&self) -> u32 {
        self.n
    }

    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.terminal.len()
    }

    /// Returns the terminal of a node.
    #[inline(always)]
    pub fn terminal(&self, node: NodeId) -> Terminal {
        let terminal = self.terminal[node as usize];
        if terminal == self.halt {
            Terminal::Halt
        } else {
            Terminal::Cycle(terminal)
        }
    }

    /// Returns the terminal of a node in sentinel form: a cycle id, or
    /// the number of nodes for `HALT`.
    #[inline(always)]
    pub fn terminal_raw(&self, node: NodeId) -> u32 {
        self.terminal[node as usize]
    }

    /// The whole terminal array in sentinel form.
    #[inline(always)]
    pub fn terminals_raw(&self) -> &[u32] {
        &self.terminal
    }

    /// Returns the depth of a node: the least k such that f_N^k(v) is on
    /// a cycle. `None` for HALT-terminating nodes.
    #[inline(always)]
    pub fn depth(&self, node: NodeId) -> Option<u32> {
        let depth = self.depth[node as usize];
        (depth != DEPTH_HALT).then_some(depth)
    }

    /// Whether the node is a cycle member.
    #[inline(always)]
    pub fn is_cycle_member(&self, node: NodeId) -> bool {
        self.depth[node as usize] == 0
    }

    #[inline(always)]
    pub fn cycles(&self) -> &CycleTable {
        &self.cycles
    }

    /// Looks a cycle up by id, or fails with
    /// [`CycleNotFound`](Error::CycleNotFound).
    pub fn cycle(&self, cycle_id: NodeId) -> Result<&Cycle> {
        self.cycles.get(cycle_id).ok_or(Error::CycleNotFound {
            n: self.n,
            cycle_id,
        })
    }

    /// Returns the basin size of every cycle, parallel to the cycle
    /// table. Basins include their cycle members.
    pub fn basin_sizes(&self) -> Vec<u64> {
        let mut sizes = vec![0u64; self.cycles.num_cycles()];
        for &terminal in self.terminal.iter() {
            if terminal != self.halt {
                // Safe: cycle-terminal nodes point at a table entry
                sizes[self.cycles.index_of(terminal).unwrap()] += 1;
            }
        }
        sizes
    }

    /// The number of HALT-terminating nodes.
    pub fn num_halting(&self) -> u64 {
        self.terminal
            .iter()
            .filter(|&&terminal| terminal == self.halt)
            .count() as u64
    }
}

/// Classifies every node of a functional graph by terminal cycle and
/// depth, visiting each node exactly once.
///
/// From every unvisited node the walk follows successors, marking the
/// path GRAY, until it reaches a resolved (BLACK) node, a halting node,
/// or a GRAY node. In the last case the GRAY suffix of the walk is a new
/// cycle: its id is the minimum node of the orbit, its members get depth
/// 0, and the rest of the walk inherits increasing depths. Since f_N is a
/// function, this one linear scan with a per-walk stack replaces a
/// general strongly-connected-components computation.
///
/// Runs in O(V) time with an auxiliary stack bounded by the longest walk.
pub fn classify(
    func: &FuncGraph,
    cancel: &CancelFlag,
    pl: &mut impl ProgressLog,
) -> Result<Classification> {
    let num_nodes = func.num_nodes();
    let halt = func.halt();
    pl.item_name("node");
    pl.expected_updates(Some(num_nodes));
    pl.start(format!("Classifying nodes under f_{}...", func.n()));

    let mut color = vec![WHITE; num_nodes].into_boxed_slice();
    let mut terminal = vec![halt; num_nodes].into_boxed_slice();
    let mut depth = vec![DEPTH_HALT; num_nodes].into_boxed_slice();
    // Position of a node on the current walk; valid only while GRAY
    let mut walk_pos = vec![0u32; num_nodes].into_boxed_slice();
    let mut walk: Vec<NodeId> = Vec::new();
    let mut cycles: Vec<Cycle> = Vec::new();
    let mut visited = 0usize;

    for start in 0..num_nodes {
        if color[start] != WHITE {
            continue;
        }
        walk.clear();
        let mut cur = start as NodeId;
        // Walk forward until the classification of the next node is known
        let (tail_terminal, tail_depth) = loop {
            color[cur as usize] = GRAY;
            walk_pos[cur as usize] = walk.len() as u32;
            walk.push(cur);
            let next = func.successor(cur);
            if next == halt {
                break (halt, DEPTH_HALT);
            }
            match color[next as usize] {
                WHITE => cur = next,
                BLACK => break (terminal[next as usize], depth[next as usize]),
                _ => {
                    // The walk closed on itself: the suffix from `next`
                    // to the top is a new cycle
                    let first = walk_pos[next as usize] as usize;
                    let orbit = &walk[first..];
                    let id = *orbit.iter().min().unwrap();
                    for &member in orbit {
                        terminal[member as usize] = id;
                        depth[member as usize] = 0;
                        color[member as usize] = BLACK;
                        pl.light_update();
                    }
                    visited += orbit.len();
                    // Members in orbit order starting at the id
                    let rotation = orbit.iter().position(|&member| member == id).unwrap();
                    let mut members = Vec::with_capacity(orbit.len());
                    members.extend_from_slice(&orbit[rotation..]);
                    members.extend_from_slice(&orbit[..rotation]);
                    cycles.push(Cycle { id, members });
                    walk.truncate(first);
                    break (id, 0);
                }
            }
        };
        // The rest of the walk is a simple path into the tail
        let steps = walk.len() as u32;
        for (position, &node) in walk.iter().enumerate() {
            terminal[node as usize] = tail_terminal;
            depth[node as usize] = if tail_depth == DEPTH_HALT {
                DEPTH_HALT
            } else {
                tail_depth + (steps - position as u32)
            };
            color[node as usize] = BLACK;
            pl.light_update();
        }
        visited += steps as usize;
        if visited >= CANCEL_GRANULARITY {
            visited %= CANCEL_GRANULARITY;
            cancel.check()?;
        }
    }
    pl.done();

    // Discovery order depends on the scan; the table does not
    cycles.sort_unstable_by_key(|cycle| cycle.id);
    Ok(Classification {
        n: func.n(),
        halt,
        terminal,
        depth,
        cycles: CycleTable { cycles },
    })
}
