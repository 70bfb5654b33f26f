/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The functional graphs induced by the N-link rules.
//!
//! For a fixed N ≥ 1, the N-link rule sends every node with at least N
//! outgoing links to its N-th outgoing neighbor, and every other node to
//! `HALT`. The result is a *functional graph*: every node has at most one
//! successor, so forward walks never branch and every trajectory either
//! falls into a cycle or halts. This module derives the successor map
//! ([`FuncGraph`]), classifies every node by terminal cycle and depth
//! ([`classify`]), and builds the predecessor CSR used for reverse
//! reachability ([`ReverseGraph`]).

mod classify;
mod reverse;
mod successors;

pub use classify::{classify, Classification, Cycle, CycleTable, Terminal};
pub use reverse::ReverseGraph;
pub use successors::FuncGraph;
