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

use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use dsi_progress_logger::prelude::*;
use nlinkgraph::snapshot::{Snapshot, SnapshotConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod controller;
pub mod sink;

pub mod basin;
pub mod chain;
pub mod cycles;
pub mod matrix;
pub mod run;
pub mod stats;
pub mod trace;

#[derive(Args, Debug)]
pub struct GlobalArgs {
    #[arg(long, value_parser = parse_log_interval, global = true, display_order = 1000)]
    /// How often to log progress, e.g. "500ms", "10s", or "2m"; a bare
    /// number is seconds. Default is 10s.
    pub log_interval: Option<Duration>,
}

impl GlobalArgs {
    /// Creates a progress logger honoring the global log interval.
    pub fn progress_logger(&self) -> ProgressLogger {
        let mut pl = progress_logger![];
        if let Some(log_interval) = self.log_interval {
            pl.log_interval(log_interval);
        }
        pl
    }
}

/// Shared CLI arguments for commands that read a snapshot.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// The directory containing the pages.tsv and nlink_sequences.tsv
    /// tables.
    pub snapshot: PathBuf,

    #[arg(long, default_value_t = '\t')]
    /// The column separator of the input tables.
    pub separator: char,
}

impl SnapshotArgs {
    pub fn load(&self, pl: &mut impl ProgressLog) -> Result<Snapshot> {
        let config = SnapshotConfig::new(&self.snapshot).with_separator(self.separator);
        Ok(nlinkgraph::snapshot::load(&config, pl)?)
    }
}

/// Parses the `-n` rule parameter; the N-link rule is defined for N ≥ 1.
///
/// Rejecting 0 here (and in [`Plan`](controller::Plan) validation, for
/// plans read from JSON) keeps the kernels free of user-input checks.
pub fn rule_parser(arg: &str) -> Result<u32> {
    match arg.parse::<u32>() {
        Ok(0) | Err(_) => bail!("N must be an integer ≥ 1, got {:?}", arg),
        Ok(n) => Ok(n),
    }
}

/// Parses the `-j` thread count, which must be at least 1.
pub fn num_threads_parser(arg: &str) -> Result<usize> {
    match arg.parse::<usize>() {
        Ok(0) | Err(_) => bail!("the number of threads must be an integer ≥ 1, got {:?}", arg),
        Ok(num_threads) => Ok(num_threads),
    }
}

/// Shared CLI arguments for commands that specify a number of threads.
#[derive(Args, Debug)]
pub struct NumThreadsArg {
    #[arg(short = 'j', long, default_value_t = std::thread::available_parallelism().map_or(1, usize::from), value_parser = num_threads_parser)]
    /// The number of threads to use.
    pub num_threads: usize,
}

/// Parses a progress-log interval: an integer with an optional `ms`, `s`,
/// or `m` unit. A bare number is seconds.
fn parse_log_interval(arg: &str) -> Result<Duration> {
    let arg = arg.trim();
    let unit_start = arg
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(arg.len());
    let (digits, unit) = arg.split_at(unit_start);
    let value = digits
        .parse::<u64>()
        .map_err(|_| anyhow!("invalid log interval {:?}", arg))?;
    match unit.trim_start() {
        "" | "s" => Ok(Duration::from_secs(value)),
        "ms" => Ok(Duration::from_millis(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        unit => Err(anyhow!("invalid log-interval unit {:?}", unit)),
    }
}

/// Initializes the `env_logger` logger with a custom format including the
/// elapsed time since initialization.
pub fn init_env_logger() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    let start = std::time::Instant::now();
    builder.format(move |buf, record| {
        let style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{:9.3}s {style}{}{style:#} [{:?}] {} - {}",
            start.elapsed().as_secs_f64(),
            record.level(),
            std::thread::current().id(),
            record.target(),
            record.args()
        )
    });
    builder.init();
    Ok(())
}

/// Creates all parent directories of the given file path.
pub fn create_parent_dir(file_path: impl AsRef<Path>) -> Result<()> {
    if let Some(parent_dir) = file_path.as_ref().parent() {
        std::fs::create_dir_all(parent_dir).map_err(|error| {
            anyhow!(
                "Failed to create the directory {:?}: {}",
                parent_dir.to_string_lossy(),
                error
            )
        })?;
    }
    Ok(())
}

/// Maps an error to the process exit code of the batch interface: 2 for
/// input validation failures, 3 for I/O errors, 4 for cancellation, 1
/// otherwise.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<nlinkgraph::Error>() {
        Some(nlinkgraph::Error::BadSnapshot(_)) => 2,
        Some(nlinkgraph::Error::InvalidRule(_)) => 2,
        Some(nlinkgraph::Error::Io(_)) => 3,
        Some(nlinkgraph::Error::Cancelled) => 4,
        Some(_) => 1,
        None => {
            if error.downcast_ref::<std::io::Error>().is_some() {
                3
            } else {
                1
            }
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    Run(run::CliArgs),
    Trace(trace::CliArgs),
    Basin(basin::CliArgs),
    Chain(chain::CliArgs),
    Cycles(cycles::CliArgs),
    Matrix(matrix::CliArgs),
    Stats(stats::CliArgs),
}

#[derive(Parser, Debug)]
#[command(name = "nlinkgraph", version)]
/// Tools to compute and query basins, branches, and multiplexes of
/// N-link functional graphs.
pub struct Cli {
    #[command(subcommand)]
    pub command: SubCommands,
    #[clap(flatten)]
    pub args: GlobalArgs,
}

/// The entry point of the command-line interface.
pub fn cli_main<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let start = std::time::Instant::now();
    let cli = Cli::parse_from(args);
    match cli.command {
        SubCommands::Run(args) => run::main(cli.args, args)?,
        SubCommands::Trace(args) => trace::main(cli.args, args)?,
        SubCommands::Basin(args) => basin::main(cli.args, args)?,
        SubCommands::Chain(args) => chain::main(cli.args, args)?,
        SubCommands::Cycles(args) => cycles::main(cli.args, args)?,
        SubCommands::Matrix(args) => matrix::main(cli.args, args)?,
        SubCommands::Stats(args) => stats::main(cli.args, args)?,
    }
    log::info!(
        "The command took {:.3} seconds",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
