/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The result sink: columnar artifacts with stable schemas.
//!
//! Artifacts are tab-separated files with a single header line. Writers
//! are atomic per file: rows go to a temporary file in the destination
//! directory which is then renamed over the final path, with one retry on
//! failure, so a final path either does not exist or holds a complete
//! artifact. The sink guarantees at most one writer per final path by
//! construction (the controller drains worker results on a single
//! thread).
//!
//! `HALT` is rendered as empty `cycle_id` and `depth` fields with
//! `terminal_kind = halt`. All ids in artifacts are external page ids;
//! the cycle id of an artifact is the page id of the minimum-node-id
//! orbit member.

use nlinkgraph::func::{Classification, Terminal};
use nlinkgraph::snapshot::NodeMap;
use nlinkgraph::{Error, Result};
use nlinkgraph_algo::basin::Basin;
use nlinkgraph_algo::branch::Branches;
use nlinkgraph_algo::multiplex::{LayerMatrix, Multiplex, TunnelNode};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Artifact file names and header schemas.
pub mod schema {
    pub const CYCLES: &str = "cycle_id\tlength\tmember_page_id\tmember_order";
    pub const BASIN_ASSIGNMENTS: &str = "page_id\tcycle_id\tdepth\tterminal_kind";
    pub const BASIN_MEMBERS: &str = "page_id\tdepth";
    pub const BASIN_MEMBERS_WITH_PARENTS: &str = "page_id\tdepth\tparent_page_id";
    pub const BASIN_LAYERS: &str = "depth\tcount";
    pub const BRANCHES: &str = "entry_page_id\tsubtree_root_page_id\tsubtree_size\trank";
    pub const MULTIPLEX: &str = "page_id\tN\tcycle_id\tdepth\tterminal_kind";
    pub const TUNNELS: &str = "page_id\tn_distinct_cycles\ttransitions\tscore\ttype";
    pub const CONNECTIVITY: &str = "n_src\tn_dst\tsame_cycle_count\tdiff_cycle_count";

    pub const MULTIPLEX_FILE: &str = "multiplex_basin_assignments.tsv";
    pub const TUNNELS_FILE: &str = "tunnel_nodes.tsv";
    pub const CONNECTIVITY_FILE: &str = "layer_connectivity.tsv";

    pub fn cycles_file(n: u32) -> String {
        format!("cycles_n={}.tsv", n)
    }

    pub fn basin_assignments_file(n: u32) -> String {
        format!("basin_assignments_n={}.tsv", n)
    }

    pub fn basin_members_file(n: u32, cycle_page_id: i64) -> String {
        format!("basin_members_n={}_cycle={}.tsv", n, cycle_page_id)
    }

    pub fn basin_layers_file(n: u32, cycle_page_id: i64) -> String {
        format!("basin_layers_n={}_cycle={}.tsv", n, cycle_page_id)
    }

    pub fn branches_file(n: u32, cycle_page_id: i64) -> String {
        format!("branches_n={}_cycle={}.tsv", n, cycle_page_id)
    }
}

/// A directory of columnar artifacts.
#[derive(Clone, Debug)]
pub struct Sink {
    dir: PathBuf,
}

impl Sink {
    /// Opens a sink, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_owned(),
        })
    }

    #[inline(always)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether an artifact exists and its header matches the expected
    /// schema. Used for checkpointing: a file failing the check is
    /// recomputed, not trusted.
    pub fn is_valid(&self, file_name: &str, header: &str) -> bool {
        let path = self.dir.join(file_name);
        let Ok(file) = std::fs::File::open(&path) else {
            return false;
        };
        let mut first_line = String::new();
        if BufReader::new(file).read_line(&mut first_line).is_err() {
            return false;
        }
        first_line.trim_end_matches(['\n', '\r']) == header
    }

    /// Writes an artifact atomically: temporary file, rows, rename; one
    /// retry with a fresh temporary file on failure.
    fn write_atomic(
        &self,
        file_name: &str,
        header: &str,
        write_rows: &mut dyn FnMut(&mut dyn Write) -> std::io::Result<()>,
    ) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        let mut last_error = None;
        for attempt in 0..2 {
            match self.try_write(&path, header, write_rows) {
                Ok(()) => {
                    if attempt > 0 {
                        log::info!("write of {} succeeded on retry", path.display());
                    }
                    return Ok(path);
                }
                Err(error) => {
                    log::warn!("write of {} failed: {}", path.display(), error);
                    last_error = Some(error);
                }
            }
        }
        Err(Error::Io(last_error.unwrap()))
    }

    fn try_write(
        &self,
        path: &Path,
        header: &str,
        write_rows: &mut dyn FnMut(&mut dyn Write) -> std::io::Result<()>,
    ) -> std::io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut buf = BufWriter::new(tmp.as_file_mut());
            writeln!(buf, "{}", header)?;
            write_rows(&mut buf)?;
            buf.flush()?;
        }
        tmp.persist(path).map_err(|persist| persist.error)?;
        Ok(())
    }

    /// Writes the cycle table of one layer, one row per cycle member in
    /// (cycle_id, member_order) order.
    pub fn write_cycles(&self, nodes: &NodeMap, classification: &Classification) -> Result<PathBuf> {
        self.write_atomic(
            &schema::cycles_file(classification.n()),
            schema::CYCLES,
            &mut |out| {
                for cycle in classification.cycles().iter() {
                    let cycle_page = nodes.page_id(cycle.id());
                    for (order, &member) in cycle.members().iter().enumerate() {
                        writeln!(
                            out,
                            "{}\t{}\t{}\t{}",
                            cycle_page,
                            cycle.len(),
                            nodes.page_id(member),
                            order
                        )?;
                    }
                }
                Ok(())
            },
        )
    }

    /// Writes the full per-node assignment table of one layer, in page-id
    /// order.
    pub fn write_basin_assignments(
        &self,
        nodes: &NodeMap,
        classification: &Classification,
    ) -> Result<PathBuf> {
        self.write_atomic(
            &schema::basin_assignments_file(classification.n()),
            schema::BASIN_ASSIGNMENTS,
            &mut |out| {
                for node in 0..classification.num_nodes() as u32 {
                    write!(out, "{}\t", nodes.page_id(node))?;
                    match classification.terminal(node) {
                        Terminal::Cycle(cycle_id) => writeln!(
                            out,
                            "{}\t{}\tcycle",
                            nodes.page_id(cycle_id),
                            classification.depth(node).unwrap()
                        )?,
                        Terminal::Halt => writeln!(out, "\t\thalt")?,
                    }
                }
                Ok(())
            },
        )
    }

    /// Writes the members of a basin in (depth, page_id) order, with
    /// reverse-BFS parents when the basin carries them.
    pub fn write_basin_members(&self, nodes: &NodeMap, n: u32, basin: &Basin) -> Result<PathBuf> {
        let cycle_page = nodes.page_id(basin.cycle_id());
        let (header, parents) = match basin.parents() {
            Some(parents) => (schema::BASIN_MEMBERS_WITH_PARENTS, Some(parents)),
            None => (schema::BASIN_MEMBERS, None),
        };
        self.write_atomic(
            &schema::basin_members_file(n, cycle_page),
            header,
            &mut |out| {
                for (index, &(node, depth)) in basin.nodes().iter().enumerate() {
                    match parents {
                        Some(parents) => writeln!(
                            out,
                            "{}\t{}\t{}",
                            nodes.page_id(node),
                            depth,
                            nodes.page_id(parents[index])
                        )?,
                        None => writeln!(out, "{}\t{}", nodes.page_id(node), depth)?,
                    }
                }
                Ok(())
            },
        )
    }

    /// Writes the depth-stratified member counts of a basin.
    pub fn write_basin_layers(&self, nodes: &NodeMap, n: u32, basin: &Basin) -> Result<PathBuf> {
        let cycle_page = nodes.page_id(basin.cycle_id());
        self.write_atomic(
            &schema::basin_layers_file(n, cycle_page),
            schema::BASIN_LAYERS,
            &mut |out| {
                for (depth, count) in basin.layers().iter().enumerate() {
                    writeln!(out, "{}\t{}", depth, count)?;
                }
                Ok(())
            },
        )
    }

    /// Writes the branch decompositions of all entries of a cycle, in
    /// (entry_page_id, rank) order with ranks starting at 1.
    pub fn write_branches(
        &self,
        nodes: &NodeMap,
        n: u32,
        cycle_page_id: i64,
        branches: &[Branches],
    ) -> Result<PathBuf> {
        let mut branches: Vec<&Branches> = branches.iter().collect();
        branches.sort_by_key(|branch| branch.entry());
        self.write_atomic(
            &schema::branches_file(n, cycle_page_id),
            schema::BRANCHES,
            &mut |out| {
                for branch in &branches {
                    let entry_page = nodes.page_id(branch.entry());
                    for (rank, subtree) in branch.subtrees().iter().enumerate() {
                        writeln!(
                            out,
                            "{}\t{}\t{}\t{}",
                            entry_page,
                            nodes.page_id(subtree.root),
                            subtree.size,
                            rank + 1
                        )?;
                    }
                }
                Ok(())
            },
        )
    }

    /// Writes the multiplex assignment table, in (page_id, N) order.
    pub fn write_multiplex_assignments(
        &self,
        nodes: &NodeMap,
        multiplex: &Multiplex,
    ) -> Result<PathBuf> {
        self.write_atomic(schema::MULTIPLEX_FILE, schema::MULTIPLEX, &mut |out| {
            for assignment in multiplex.assignments() {
                write!(out, "{}\t{}\t", nodes.page_id(assignment.node), assignment.n)?;
                match assignment.terminal {
                    Terminal::Cycle(cycle_id) => writeln!(
                        out,
                        "{}\t{}\tcycle",
                        nodes.page_id(cycle_id),
                        assignment.depth.unwrap()
                    )?,
                    Terminal::Halt => writeln!(out, "\t\thalt")?,
                }
            }
            Ok(())
        })
    }

    /// Writes the tunnel-node table, in (score desc, page_id) order.
    pub fn write_tunnels(&self, nodes: &NodeMap, tunnels: &[TunnelNode]) -> Result<PathBuf> {
        self.write_atomic(schema::TUNNELS_FILE, schema::TUNNELS, &mut |out| {
            for tunnel in tunnels {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}\t{}",
                    nodes.page_id(tunnel.node),
                    tunnel.distinct_cycles,
                    tunnel.transitions,
                    tunnel.score,
                    tunnel.kind.as_str()
                )?;
            }
            Ok(())
        })
    }

    /// Writes the layer-connectivity matrix, in (n_src, n_dst) order.
    pub fn write_connectivity(&self, matrix: &LayerMatrix) -> Result<PathBuf> {
        self.write_atomic(schema::CONNECTIVITY_FILE, schema::CONNECTIVITY, &mut |out| {
            for (n_src, n_dst, same, diff) in matrix.rows() {
                writeln!(out, "{}\t{}\t{}\t{}", n_src, n_dst, same, diff)?;
            }
            Ok(())
        })
    }

    /// Reads the rows of an artifact back, header excluded. Readers are
    /// stateless; this is mainly for tests and summaries.
    pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<Vec<String>>> {
        let file = std::fs::File::open(path.as_ref())?;
        let mut lines = BufReader::new(file).lines();
        // header
        if lines.next().transpose()?.is_none() {
            return Err(Error::bad_snapshot(format!(
                "{}: empty artifact",
                path.as_ref().display()
            )));
        }
        let mut rows = Vec::new();
        for line in lines {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            rows.push(line.split('\t').map(str::to_owned).collect());
        }
        Ok(rows)
    }
}
