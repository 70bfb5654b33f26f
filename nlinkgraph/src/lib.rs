/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]

pub mod error;
pub mod func;
pub mod graphs;
pub mod snapshot;
pub mod utils;

pub use error::{Error, Result};

/// A dense node identifier, valid in `[0, V)` for a given snapshot.
///
/// The value `V` itself is reserved: it is the `HALT` sentinel of the
/// per-N successor maps (see [`func::FuncGraph::halt`]).
pub type NodeId = u32;

/// Prelude module to import everything from this crate.
pub mod prelude {
    pub use crate::error::*;
    pub use crate::func::*;
    pub use crate::graphs::*;
    pub use crate::snapshot::*;
    pub use crate::utils::*;
    pub use crate::NodeId;
}
