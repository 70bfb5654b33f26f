/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{rule_parser, GlobalArgs, SnapshotArgs};
use anyhow::Result;
use clap::Args;
use nlinkgraph::func::{classify, FuncGraph, ReverseGraph};
use nlinkgraph::utils::CancelFlag;
use nlinkgraph_algo::branch::dominant_chain;
use std::io::Write;

#[derive(Args, Debug)]
#[command(
    about = "Follow the dominant upstream chain from a seed page.",
    long_about = "From the seed, repeatedly move to the predecessor with the largest \
depth-1 subtree (ties by ascending page id), until the dominance ratio drops below \
the threshold or only trivial predecessors remain."
)]
pub struct CliArgs {
    #[clap(flatten)]
    pub snapshot: SnapshotArgs,

    /// The seed page.
    pub page_id: i64,

    #[arg(short = 'n', long, value_parser = rule_parser)]
    /// The rule parameter N.
    pub n: u32,

    #[arg(long, default_value_t = 0.5)]
    /// Stop when the dominance ratio of a step falls below this value.
    pub threshold: f64,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut pl = global_args.progress_logger();
    let snapshot = args.snapshot.load(&mut pl)?;
    let seed = snapshot.nodes().node_of(args.page_id)?;

    let func = FuncGraph::new(snapshot.graph(), args.n);
    let classification = classify(&func, &CancelFlag::new(), &mut pl)?;
    let reverse = ReverseGraph::new(&func, &CancelFlag::new(), &mut pl)?;
    let chain = dominant_chain(
        &reverse,
        &classification,
        seed,
        args.threshold,
        &CancelFlag::new(),
    )?;

    let mut stdout = std::io::BufWriter::new(std::io::stdout().lock());
    writeln!(stdout, "step\tpage_id\tsubtree_size\tdominance\ttitle")?;
    for (step, link) in chain.iter().enumerate() {
        writeln!(
            stdout,
            "{}\t{}\t{}\t{}\t{}",
            step,
            snapshot.nodes().page_id(link.node),
            link.subtree_size,
            link.dominance,
            snapshot.nodes().title(link.node)
        )?;
    }
    stdout.flush()?;
    log::info!("chain of {} steps", chain.len());
    Ok(())
}
