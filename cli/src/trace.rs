/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{rule_parser, GlobalArgs, SnapshotArgs};
use anyhow::Result;
use clap::Args;
use nlinkgraph::func::{classify, FuncGraph, Terminal};
use nlinkgraph::utils::CancelFlag;
use nlinkgraph_algo::query;
use std::io::Write;

#[derive(Args, Debug)]
#[command(about = "Trace the trajectory of a page under one rule.", long_about = None)]
pub struct CliArgs {
    #[clap(flatten)]
    pub snapshot: SnapshotArgs,

    /// The page to trace.
    pub page_id: i64,

    #[arg(short = 'n', long, value_parser = rule_parser)]
    /// The rule parameter N.
    pub n: u32,

    #[arg(long, default_value_t = 1000)]
    /// Stop the walk after this many rule applications.
    pub max_steps: u32,

    #[arg(long, default_value_t = 32)]
    /// How many path nodes to print.
    pub path_prefix: usize,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut pl = global_args.progress_logger();
    let snapshot = args.snapshot.load(&mut pl)?;
    let start = snapshot.nodes().node_of(args.page_id)?;

    let func = FuncGraph::new(snapshot.graph(), args.n);
    let classification = classify(&func, &CancelFlag::new(), &mut pl)?;
    let result = query::trace(&func, &classification, start, args.max_steps, args.path_prefix);

    let mut stdout = std::io::BufWriter::new(std::io::stdout().lock());
    writeln!(stdout, "step\tpage_id\ttitle")?;
    for (step, &node) in result.path.iter().enumerate() {
        writeln!(
            stdout,
            "{}\t{}\t{}",
            step,
            snapshot.nodes().page_id(node),
            snapshot.nodes().title(node)
        )?;
    }
    stdout.flush()?;

    match result.terminal {
        Terminal::Cycle(cycle_id) => log::info!(
            "page {} reaches cycle {} in {} steps{}",
            args.page_id,
            snapshot.nodes().page_id(cycle_id),
            result.steps,
            if result.truncated { " (walk truncated)" } else { "" }
        ),
        Terminal::Halt => log::info!(
            "page {} halts after {} steps{}",
            args.page_id,
            result.steps,
            if result.truncated { " (walk truncated)" } else { "" }
        ),
    }
    Ok(())
}
