/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::controller::{run_plan, CycleSelection, Outputs, Plan};
use crate::{rule_parser, GlobalArgs, NumThreadsArg, SnapshotArgs};
use anyhow::{ensure, Context, Result};
use clap::Args;
use nlinkgraph::utils::CancelFlag;
use std::path::PathBuf;

#[derive(Args, Debug)]
#[command(about = "Execute a batch plan, writing columnar artifacts.", long_about = None)]
pub struct CliArgs {
    #[clap(flatten)]
    pub snapshot: SnapshotArgs,

    #[arg(long)]
    /// A JSON plan file; when given, the plan options below are ignored.
    pub plan: Option<PathBuf>,

    #[arg(long)]
    /// The directory where artifacts are written.
    pub output: Option<PathBuf>,

    #[arg(long, value_delimiter = ',', num_args = 1.., value_parser = rule_parser)]
    /// The N values to analyze, comma separated.
    pub n_set: Vec<u32>,

    #[arg(long, default_value_t = 1)]
    /// Materialize the k largest basins of every layer.
    pub top_k: usize,

    #[arg(long, value_delimiter = ',')]
    /// Materialize the cycles containing these page ids instead of the
    /// largest ones.
    pub cycle_pages: Vec<i64>,

    #[arg(long)]
    /// Soft cap on basin sizes; hitting it truncates with a warning.
    pub basin_budget: Option<usize>,

    #[arg(long)]
    /// Emit reverse-BFS parents with basin members.
    pub parents: bool,

    #[arg(long, default_value_t = 10.0)]
    /// The constant of the tunnel importance score.
    pub score_constant: f64,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let plan = match &args.plan {
        Some(path) => Plan::from_path(path)?,
        None => {
            let output_dir = args
                .output
                .clone()
                .context("either --plan or --output is required")?;
            ensure!(!args.n_set.is_empty(), "--n-set must not be empty");
            Plan {
                n_set: args.n_set.clone(),
                output_dir,
                cycles: if args.cycle_pages.is_empty() {
                    CycleSelection::TopK(args.top_k)
                } else {
                    CycleSelection::Pages(args.cycle_pages.clone())
                },
                outputs: Outputs::default(),
                basin_budget: args.basin_budget,
                basin_parents: args.parents,
                score_constant: args.score_constant,
                num_threads: args.num_threads.num_threads,
            }
        }
    };

    let mut pl = global_args.progress_logger();
    let snapshot = args.snapshot.load(&mut pl)?;
    run_plan(&snapshot, &plan, &CancelFlag::new(), &global_args)
}
