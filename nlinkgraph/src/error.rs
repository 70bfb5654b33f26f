/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The error taxonomy of the engine.
//!
//! Kernel functions are pure over the snapshot and surface these errors to
//! the caller; the controller decides whether to skip, retry, or abort.

use crate::NodeId;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The input tables violate a structural invariant. Fatal: no partial
    /// output is retained.
    #[error("bad snapshot: {0}")]
    BadSnapshot(String),
    /// A rule parameter outside the valid range was requested. The N-link
    /// rule is defined for N ≥ 1.
    #[error("invalid rule parameter N={0}: the N-link rule is defined for N ≥ 1")]
    InvalidRule(u32),
    /// A query referenced a cycle id that is not in the cycle table of the
    /// given rule.
    #[error("node {cycle_id} is not a cycle of f_{n}")]
    CycleNotFound { n: u32, cycle_id: NodeId },
    /// A query referenced a page id outside the snapshot.
    #[error("page {0} is not in the snapshot")]
    NodeNotFound(i64),
    /// A basin size budget was hit in strict mode. In the default
    /// cap-then-truncate mode this error is never returned; the partial
    /// result carries a `truncated` marker instead.
    #[error("basin budget of {0} nodes exceeded")]
    BudgetExceeded(usize),
    /// Cooperative cancellation was requested.
    #[error("cancelled")]
    Cancelled,
    /// Read or write failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor for [`Error::BadSnapshot`].
    pub fn bad_snapshot(msg: impl Into<String>) -> Self {
        Error::BadSnapshot(msg.into())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
