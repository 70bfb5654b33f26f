/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{create_parent_dir, rule_parser, GlobalArgs, SnapshotArgs};
use anyhow::{bail, Result};
use clap::Args;
use nlinkgraph::func::{classify, FuncGraph, ReverseGraph, Terminal};
use nlinkgraph::utils::CancelFlag;
use nlinkgraph_algo::query;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
#[command(about = "Stream the basin of a cycle as (page_id, depth) rows.", long_about = None)]
pub struct CliArgs {
    #[clap(flatten)]
    pub snapshot: SnapshotArgs,

    /// The page id of any member of the cycle.
    pub cycle_page: i64,

    #[arg(short = 'n', long, value_parser = rule_parser)]
    /// The rule parameter N.
    pub n: u32,

    #[arg(long)]
    /// Truncate the stream after this many rows.
    pub max_rows: Option<usize>,

    #[arg(long)]
    /// Write to this file instead of standard output.
    pub output: Option<PathBuf>,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut pl = global_args.progress_logger();
    let snapshot = args.snapshot.load(&mut pl)?;
    let member = snapshot.nodes().node_of(args.cycle_page)?;

    let func = FuncGraph::new(snapshot.graph(), args.n);
    let classification = classify(&func, &CancelFlag::new(), &mut pl)?;
    if !classification.is_cycle_member(member) {
        bail!(
            "page {} is not on a cycle at N={}",
            args.cycle_page,
            args.n
        );
    }
    let cycle_id = match classification.terminal(member) {
        Terminal::Cycle(cycle_id) => cycle_id,
        Terminal::Halt => unreachable!("cycle members never halt"),
    };
    let reverse = ReverseGraph::new(&func, &CancelFlag::new(), &mut pl)?;
    let rows = query::basin_of(
        &func,
        &reverse,
        &classification,
        cycle_id,
        args.max_rows,
        &CancelFlag::new(),
    )?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => {
            create_parent_dir(path)?;
            Box::new(std::io::BufWriter::new(std::fs::File::create(path)?))
        }
        None => Box::new(std::io::BufWriter::new(std::io::stdout().lock())),
    };
    writeln!(out, "page_id\tdepth")?;
    for (node, depth) in rows {
        writeln!(out, "{}\t{}", snapshot.nodes().page_id(node), depth)?;
    }
    out.flush()?;
    Ok(())
}
