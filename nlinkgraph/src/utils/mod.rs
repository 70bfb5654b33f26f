/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Collection of common functions we use throughout the codebase.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How many nodes a linear pass may process between two cancellation
/// checks.
pub const CANCEL_GRANULARITY: usize = 1 << 20;

/// A cloneable cooperative-cancellation flag.
///
/// Long-running kernels check the flag at coarse granularity (between
/// reverse-BFS levels and every [`CANCEL_GRANULARITY`] nodes during
/// linear passes) and return [`Error::Cancelled`] when it is raised. Partial
/// artifacts are discarded by the write-then-rename discipline of the
/// sink, so a cancelled run never leaves a final file behind.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns [`Error::Cancelled`] if the flag has been raised.
    #[inline(always)]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
