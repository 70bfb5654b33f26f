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

pub mod basin;
pub mod branch;
pub mod multiplex;
pub mod query;

pub mod prelude {
    pub use crate::basin::*;
    pub use crate::branch::*;
    pub use crate::multiplex::*;
    pub use crate::query::*;
}

/// Creates a [`ThreadPool`](rayon::ThreadPool), with an optional number
/// of threads.
///
/// # Examples
/// ```
/// use nlinkgraph_algo::thread_pool;
/// // A thread pool with default parallelism
/// let pool = thread_pool![];
/// // A thread pool with 2 threads
/// let pool = thread_pool![2];
/// ```
#[macro_export]
macro_rules! thread_pool {
    () => {
        ::rayon::ThreadPoolBuilder::new()
            .build()
            .expect("Cannot build a ThreadPool with default parameters")
    };
    ($num_threads:expr) => {
        ::rayon::ThreadPoolBuilder::new()
            .num_threads($num_threads)
            .build()
            .unwrap_or_else(|_| {
                panic!(
                    "Cannot build a ThreadPool with {} threads",
                    $num_threads,
                )
            })
    };
}
