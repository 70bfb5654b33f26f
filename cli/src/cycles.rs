/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{rule_parser, GlobalArgs, SnapshotArgs};
use anyhow::Result;
use clap::Args;
use nlinkgraph::func::{classify, FuncGraph};
use nlinkgraph::utils::CancelFlag;
use std::io::Write;

#[derive(Args, Debug)]
#[command(about = "List the cycles of one rule with their lengths.", long_about = None)]
pub struct CliArgs {
    #[clap(flatten)]
    pub snapshot: SnapshotArgs,

    #[arg(short = 'n', long, value_parser = rule_parser)]
    /// The rule parameter N.
    pub n: u32,

    #[arg(long)]
    /// Also print one row per cycle member.
    pub members: bool,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut pl = global_args.progress_logger();
    let snapshot = args.snapshot.load(&mut pl)?;
    let func = FuncGraph::new(snapshot.graph(), args.n);
    let classification = classify(&func, &CancelFlag::new(), &mut pl)?;

    let mut stdout = std::io::BufWriter::new(std::io::stdout().lock());
    if args.members {
        writeln!(stdout, "cycle_id\tlength\tmember_page_id\tmember_order")?;
        for cycle in classification.cycles().iter() {
            let cycle_page = snapshot.nodes().page_id(cycle.id());
            for (order, &member) in cycle.members().iter().enumerate() {
                writeln!(
                    stdout,
                    "{}\t{}\t{}\t{}",
                    cycle_page,
                    cycle.len(),
                    snapshot.nodes().page_id(member),
                    order
                )?;
            }
        }
    } else {
        writeln!(stdout, "cycle_id\tlength")?;
        for cycle in classification.cycles().iter() {
            writeln!(
                stdout,
                "{}\t{}",
                snapshot.nodes().page_id(cycle.id()),
                cycle.len()
            )?;
        }
    }
    stdout.flush()?;
    log::info!(
        "{} cycles, {} halting nodes",
        classification.cycles().num_cycles(),
        classification.num_halting()
    );
    Ok(())
}
