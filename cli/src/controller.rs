/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The controller: executes a batch plan over a snapshot.
//!
//! The per-layer phases (successor map, classification, per-N tables)
//! run sequentially over the N set to bound peak memory; basin and branch
//! materialization for the selected cycles fans out on a bounded worker
//! pool, with results drained over a channel by the single writer thread.
//! Per-N state is released when the layer completes; only the
//! classifications survive, as the multiplex join needs them.
//!
//! Every artifact is written atomically, so checkpointing is by
//! existence: on restart, artifacts that exist and pass the schema check
//! are skipped, everything else is recomputed. A per-N failure is
//! isolated: the layer is skipped and the remaining layers still
//! complete.

use crate::sink::{schema, Sink};
use crate::GlobalArgs;
use anyhow::{bail, Context, Result};
use nlinkgraph::func::{classify, Classification, FuncGraph, ReverseGraph, Terminal};
use nlinkgraph::snapshot::{NodeMap, Snapshot};
use nlinkgraph::utils::CancelFlag;
use nlinkgraph::NodeId;
use nlinkgraph_algo::basin::{materialize, Basin, BasinOptions};
use nlinkgraph_algo::branch::{decompose, Branches};
use nlinkgraph_algo::multiplex::Multiplex;
use nlinkgraph_algo::thread_pool;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which cycles of every layer get their basins and branches
/// materialized.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleSelection {
    /// The k cycles with the largest basins, ties by ascending cycle id.
    TopK(usize),
    /// Explicit cycles, given by the page id of any of their members.
    Pages(Vec<i64>),
}

impl Default for CycleSelection {
    fn default() -> Self {
        CycleSelection::TopK(1)
    }
}

fn default_true() -> bool {
    true
}

/// Which artifact families to emit.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Outputs {
    /// Per-N cycle tables and basin assignments.
    #[serde(default = "default_true")]
    pub per_n: bool,
    /// Per-cycle basin members and layers.
    #[serde(default = "default_true")]
    pub basins: bool,
    /// Per-cycle branch decompositions.
    #[serde(default = "default_true")]
    pub branches: bool,
    /// Multiplex assignments, tunnel nodes, layer connectivity.
    #[serde(default = "default_true")]
    pub multiplex: bool,
}

impl Default for Outputs {
    fn default() -> Self {
        Self {
            per_n: true,
            basins: true,
            branches: true,
            multiplex: true,
        }
    }
}

fn default_score_constant() -> f64 {
    10.0
}

/// A batch plan: the N set, the cycles to materialize, and the outputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    /// The rule parameters to analyze, e.g. `[3, 4, 5, 6, 7, 8, 9, 10]`.
    pub n_set: Vec<u32>,
    /// Where artifacts are written.
    pub output_dir: PathBuf,
    #[serde(default)]
    pub cycles: CycleSelection,
    #[serde(default)]
    pub outputs: Outputs,
    /// Soft cap on basin sizes; hitting it truncates with a warning.
    #[serde(default)]
    pub basin_budget: Option<usize>,
    /// Emit reverse-BFS parents with basin members.
    #[serde(default)]
    pub basin_parents: bool,
    /// The constant of the tunnel importance score.
    #[serde(default = "default_score_constant")]
    pub score_constant: f64,
    /// Worker threads; 0 means the rayon default.
    #[serde(default)]
    pub num_threads: usize,
}

impl Plan {
    /// Reads a plan from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Could not open plan {}", path.display()))?;
        let plan = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Could not parse plan {}", path.display()))?;
        Ok(plan)
    }
}

/// Checks whether an artifact needs (re)writing, logging the checkpoint
/// decision.
fn needs_write(sink: &Sink, file_name: &str, header: &str) -> bool {
    if sink.is_valid(file_name, header) {
        log::info!("skipping {}: checkpoint is valid", file_name);
        false
    } else {
        if sink.dir().join(file_name).exists() {
            log::warn!("existing {} failed the schema check, recomputing", file_name);
        }
        true
    }
}

/// Executes a plan over a snapshot.
pub fn run_plan(
    snapshot: &Snapshot,
    plan: &Plan,
    cancel: &CancelFlag,
    global: &GlobalArgs,
) -> Result<()> {
    let sink = Sink::new(&plan.output_dir)?;
    let mut n_set = plan.n_set.clone();
    n_set.sort_unstable();
    n_set.dedup();
    if n_set.is_empty() {
        bail!("the plan has an empty N set");
    }
    // Plans read from JSON bypass the CLI value parsers
    if n_set[0] < 1 {
        return Err(nlinkgraph::Error::InvalidRule(n_set[0]).into());
    }
    let num_threads = if plan.num_threads == 0 {
        rayon::current_num_threads().max(1)
    } else {
        plan.num_threads
    };
    let pool = thread_pool![num_threads];
    log::info!(
        "running plan over {} layers with {} threads into {}",
        n_set.len(),
        num_threads,
        sink.dir().display()
    );

    let mut layers: Vec<(u32, Classification)> = Vec::new();
    let mut failed_layers = 0usize;
    for &n in &n_set {
        cancel.check()?;
        match run_layer(snapshot, plan, n, &sink, &pool, cancel, global) {
            Ok(classification) => layers.push((n, classification)),
            Err(error) => {
                if matches!(
                    error.downcast_ref::<nlinkgraph::Error>(),
                    Some(nlinkgraph::Error::Cancelled)
                ) {
                    return Err(error);
                }
                // Per-N failures are isolated
                log::error!("skipping layer N={}: {:#}", n, error);
                failed_layers += 1;
            }
        }
    }
    if layers.is_empty() {
        bail!("no layer completed");
    }

    if plan.outputs.multiplex {
        if failed_layers > 0 {
            log::warn!(
                "building the multiplex over {} of {} layers",
                layers.len(),
                n_set.len()
            );
        }
        let multiplex = Multiplex::from_layers(layers)?;
        let nodes = snapshot.nodes();
        if needs_write(&sink, schema::MULTIPLEX_FILE, schema::MULTIPLEX) {
            sink.write_multiplex_assignments(nodes, &multiplex)?;
        }
        if needs_write(&sink, schema::TUNNELS_FILE, schema::TUNNELS) {
            let mut pl = global.progress_logger();
            let tunnels = multiplex.tunnels(plan.score_constant, cancel, &mut pl)?;
            log::info!("{} tunnel nodes", tunnels.len());
            sink.write_tunnels(nodes, &tunnels)?;
        }
        if needs_write(&sink, schema::CONNECTIVITY_FILE, schema::CONNECTIVITY) {
            let mut pl = global.progress_logger();
            let matrix = multiplex.connectivity(&pool, cancel, &mut pl)?;
            sink.write_connectivity(&matrix)?;
        }
    }
    if failed_layers > 0 {
        log::warn!("{} of {} layers failed", failed_layers, n_set.len());
    }
    Ok(())
}

/// Classification, per-N tables, and the basin/branch fan-out for one
/// layer.
fn run_layer(
    snapshot: &Snapshot,
    plan: &Plan,
    n: u32,
    sink: &Sink,
    pool: &rayon::ThreadPool,
    cancel: &CancelFlag,
    global: &GlobalArgs,
) -> Result<Classification> {
    let mut pl = global.progress_logger();
    let func = FuncGraph::new(snapshot.graph(), n);
    let classification = classify(&func, cancel, &mut pl)?;
    log::info!(
        "layer N={}: {} cycles, {} halting nodes",
        n,
        classification.cycles().num_cycles(),
        classification.num_halting()
    );

    if plan.outputs.per_n {
        if needs_write(sink, &schema::cycles_file(n), schema::CYCLES) {
            sink.write_cycles(snapshot.nodes(), &classification)?;
        }
        if needs_write(
            sink,
            &schema::basin_assignments_file(n),
            schema::BASIN_ASSIGNMENTS,
        ) {
            sink.write_basin_assignments(snapshot.nodes(), &classification)?;
        }
    }

    if plan.outputs.basins || plan.outputs.branches {
        let selected = select_cycles(&classification, &plan.cycles, snapshot.nodes())?;
        let pending: Vec<NodeId> = selected
            .into_iter()
            .filter(|&cycle_id| {
                cycle_needs_work(sink, plan, n, snapshot.nodes().page_id(cycle_id))
            })
            .collect();
        if !pending.is_empty() {
            let reverse = ReverseGraph::new(&func, cancel, &mut pl)?;
            fan_out(
                snapshot, plan, n, &func, &reverse, &classification, &pending, sink, pool, cancel,
            )?;
        }
    }
    Ok(classification)
}

/// Whether any requested artifact of the cycle is missing or invalid.
fn cycle_needs_work(sink: &Sink, plan: &Plan, n: u32, cycle_page_id: i64) -> bool {
    let members_header = if plan.basin_parents {
        schema::BASIN_MEMBERS_WITH_PARENTS
    } else {
        schema::BASIN_MEMBERS
    };
    let mut needed = false;
    if plan.outputs.basins {
        needed |= needs_write(
            sink,
            &schema::basin_members_file(n, cycle_page_id),
            members_header,
        );
        needed |= needs_write(
            sink,
            &schema::basin_layers_file(n, cycle_page_id),
            schema::BASIN_LAYERS,
        );
    }
    if plan.outputs.branches {
        needed |= needs_write(
            sink,
            &schema::branches_file(n, cycle_page_id),
            schema::BRANCHES,
        );
    }
    needed
}

/// Resolves the plan's cycle selection to cycle ids of this layer.
fn select_cycles(
    classification: &Classification,
    selection: &CycleSelection,
    nodes: &NodeMap,
) -> Result<Vec<NodeId>> {
    match selection {
        CycleSelection::TopK(k) => {
            let ids: Vec<NodeId> = classification
                .cycles()
                .iter()
                .map(|cycle| cycle.id())
                .collect();
            let sizes = classification.basin_sizes();
            let mut order: Vec<usize> = (0..ids.len()).collect();
            // The table is in id order, so the index is the tie-break
            order.sort_by_key(|&index| (std::cmp::Reverse(sizes[index]), index));
            Ok(order.into_iter().take(*k).map(|index| ids[index]).collect())
        }
        CycleSelection::Pages(pages) => {
            let mut cycle_ids = Vec::new();
            for &page_id in pages {
                let node = nodes.node_of(page_id)?;
                match classification.terminal(node) {
                    Terminal::Cycle(cycle_id) if classification.is_cycle_member(node) => {
                        cycle_ids.push(cycle_id)
                    }
                    _ => log::warn!(
                        "page {} is not on a cycle at N={}; skipping",
                        page_id,
                        classification.n()
                    ),
                }
            }
            cycle_ids.sort_unstable();
            cycle_ids.dedup();
            Ok(cycle_ids)
        }
    }
}

type CycleResult = nlinkgraph::Result<(Option<Basin>, Vec<Branches>)>;

/// Materializes the pending cycles on the worker pool; the current thread
/// is the only writer.
#[allow(clippy::too_many_arguments)]
fn fan_out(
    snapshot: &Snapshot,
    plan: &Plan,
    n: u32,
    func: &FuncGraph,
    reverse: &ReverseGraph,
    classification: &Classification,
    pending: &[NodeId],
    sink: &Sink,
    pool: &rayon::ThreadPool,
    cancel: &CancelFlag,
) -> Result<()> {
    let options = BasinOptions {
        budget: plan.basin_budget,
        strict: false,
        parents: plan.basin_parents,
    };
    let (tx, rx) = crossbeam_channel::unbounded::<(NodeId, CycleResult)>();
    let mut outcome: Result<()> = Ok(());
    pool.in_place_scope(|scope| {
        for &cycle_id in pending {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let result =
                    compute_cycle(plan, func, reverse, classification, cycle_id, &options, cancel);
                // The receiver outlives the scope
                let _ = tx.send((cycle_id, result));
            });
        }
        drop(tx);
        for (cycle_id, result) in rx {
            if outcome.is_err() {
                continue;
            }
            let cycle_page_id = snapshot.nodes().page_id(cycle_id);
            match result {
                Ok((basin, branches)) => {
                    outcome = write_cycle_outputs(
                        snapshot.nodes(),
                        plan,
                        n,
                        sink,
                        cycle_page_id,
                        basin,
                        branches,
                    );
                }
                Err(error @ nlinkgraph::Error::Cancelled) => outcome = Err(error.into()),
                Err(error) => {
                    // Per-cycle failures are isolated too
                    log::error!("cycle {} at N={} failed: {}", cycle_page_id, n, error);
                }
            }
        }
    });
    outcome
}

fn compute_cycle(
    plan: &Plan,
    func: &FuncGraph,
    reverse: &ReverseGraph,
    classification: &Classification,
    cycle_id: NodeId,
    options: &BasinOptions,
    cancel: &CancelFlag,
) -> CycleResult {
    use dsi_progress_logger::prelude::*;

    let basin = if plan.outputs.basins {
        Some(materialize(
            func,
            reverse,
            classification,
            cycle_id,
            options,
            cancel,
            no_logging![],
        )?)
    } else {
        None
    };
    let branches = if plan.outputs.branches {
        let cycle = classification.cycle(cycle_id)?;
        let mut all = Vec::new();
        for &entry in cycle.members() {
            let decomposition = decompose(reverse, classification, entry, cancel)?;
            // Only cycle members with at least one non-cycle predecessor
            // are entries
            if !decomposition.subtrees().is_empty() {
                all.push(decomposition);
            }
        }
        all
    } else {
        Vec::new()
    };
    Ok((basin, branches))
}

fn write_cycle_outputs(
    nodes: &NodeMap,
    plan: &Plan,
    n: u32,
    sink: &Sink,
    cycle_page_id: i64,
    basin: Option<Basin>,
    branches: Vec<Branches>,
) -> Result<()> {
    if let Some(basin) = basin {
        sink.write_basin_members(nodes, n, &basin)?;
        sink.write_basin_layers(nodes, n, &basin)?;
        log::info!(
            "basin of cycle {} at N={}: {} members over {} layers{}",
            cycle_page_id,
            n,
            basin.len(),
            basin.layers().len(),
            if basin.truncated() { " (truncated)" } else { "" }
        );
    }
    if plan.outputs.branches {
        sink.write_branches(nodes, n, cycle_page_id, &branches)?;
    }
    Ok(())
}
