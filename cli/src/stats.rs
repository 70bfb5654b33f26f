/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{GlobalArgs, SnapshotArgs};
use anyhow::Result;
use clap::Args;
use std::io::Write;

#[derive(Args, Debug)]
#[command(
    about = "Snapshot statistics: outdegrees and the halting census per N.",
    long_about = "Prints, for each N in [1, max_n], how many nodes halt under the \
N-link rule (i.e. have outdegree < N). Useful for choosing the N set of a plan."
)]
pub struct CliArgs {
    #[clap(flatten)]
    pub snapshot: SnapshotArgs,

    #[arg(long, default_value_t = 10)]
    /// The largest N of the halting census.
    pub max_n: u32,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut pl = global_args.progress_logger();
    let snapshot = args.snapshot.load(&mut pl)?;
    let graph = snapshot.graph();

    let max_n = args.max_n as usize;
    // histogram[d] counts nodes of outdegree d, capped at max_n
    let mut histogram = vec![0u64; max_n + 1];
    let mut max_outdegree = 0usize;
    for node in 0..graph.num_nodes() as u32 {
        let outdegree = graph.outdegree(node);
        histogram[outdegree.min(max_n)] += 1;
        max_outdegree = max_outdegree.max(outdegree);
    }

    let mut stdout = std::io::BufWriter::new(std::io::stdout().lock());
    writeln!(stdout, "n\thalting_count")?;
    let mut halting = 0u64;
    for n in 1..=max_n {
        halting += histogram[n - 1];
        writeln!(stdout, "{}\t{}", n, halting)?;
    }
    stdout.flush()?;

    log::info!(
        "{} nodes, {} links, mean outdegree {:.3}, max outdegree {}",
        graph.num_nodes(),
        graph.num_arcs(),
        graph.num_arcs() as f64 / graph.num_nodes().max(1) as f64,
        max_outdegree
    );
    Ok(())
}
