/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{rule_parser, GlobalArgs, NumThreadsArg, SnapshotArgs};
use anyhow::Result;
use clap::Args;
use nlinkgraph::utils::CancelFlag;
use nlinkgraph_algo::multiplex::Multiplex;
use nlinkgraph_algo::thread_pool;
use std::io::Write;

#[derive(Args, Debug)]
#[command(about = "Compute the layer-connectivity matrix of an N set.", long_about = None)]
pub struct CliArgs {
    #[clap(flatten)]
    pub snapshot: SnapshotArgs,

    #[arg(long, value_delimiter = ',', num_args = 1.., value_parser = rule_parser)]
    /// The N values of the multiplex, comma separated.
    pub n_set: Vec<u32>,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut pl = global_args.progress_logger();
    let snapshot = args.snapshot.load(&mut pl)?;
    let pool = thread_pool![args.num_threads.num_threads];
    let cancel = CancelFlag::new();

    let multiplex = Multiplex::build(snapshot.graph(), &args.n_set, &pool, &cancel, &mut pl)?;
    let matrix = multiplex.connectivity(&pool, &cancel, &mut pl)?;

    let mut stdout = std::io::BufWriter::new(std::io::stdout().lock());
    writeln!(stdout, "n_src\tn_dst\tsame_cycle_count\tdiff_cycle_count")?;
    for (n_src, n_dst, same, diff) in matrix.rows() {
        writeln!(stdout, "{}\t{}\t{}\t{}", n_src, n_dst, same, diff)?;
    }
    stdout.flush()?;
    Ok(())
}
