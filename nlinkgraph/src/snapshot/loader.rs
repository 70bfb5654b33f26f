/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{NodeMap, Snapshot};
use crate::error::{Error, Result};
use crate::graphs::CsrGraph;
use crate::NodeId;
use dsi_progress_logger::prelude::*;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Location and format of the ingested tables.
///
/// Tables are line-oriented with a single header line and a configurable
/// single-character separator (tab by default). This does not support any
/// form of escaping; a separator may however appear inside the title
/// column, which is parsed from both ends of the line.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Path of the `pages` table.
    pub pages: PathBuf,
    /// Path of the `nlink_sequences` table.
    pub sequences: PathBuf,
    /// The column separator.
    pub separator: char,
}

impl SnapshotConfig {
    /// Configuration for the conventional layout: `pages.tsv` and
    /// `nlink_sequences.tsv` inside `dir`, tab-separated.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            pages: dir.join("pages.tsv"),
            sequences: dir.join("nlink_sequences.tsv"),
            separator: '\t',
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }
}

/// One row of the `pages` table.
struct PageRow {
    page_id: i64,
    title: String,
    namespace: i32,
    is_redirect: bool,
}

/// Materializes a [`Snapshot`] from the ingested tables.
///
/// Runs two streaming passes: one over `pages` to assign node ids (by
/// ascending page id over namespace-0, non-redirect pages), one over
/// `nlink_sequences` to build the CSR. The sequence pass validates the
/// structural invariants of the ingestion contract and fails with
/// [`BadSnapshot`](Error::BadSnapshot) on the first violation:
/// sequences not sorted by `(from_page_id, position)`, positions not
/// dense and 1-based, or a `from_page_id` missing from `pages`.
///
/// Links to filtered-out pages are dropped and their positional slot with
/// them, so surviving positions are re-packed.
pub fn load(config: &SnapshotConfig, pl: &mut impl ProgressLog) -> Result<Snapshot> {
    let (nodes, all_page_ids) = load_pages(config, pl)?;
    let graph = load_sequences(config, &nodes, &all_page_ids, pl)?;
    Ok(Snapshot::new(graph, nodes))
}

fn load_pages(config: &SnapshotConfig, pl: &mut impl ProgressLog) -> Result<(NodeMap, Box<[i64]>)> {
    let sep = config.separator;
    let path = &config.pages;
    let mut lines = open_table(path, &["page_id", "title", "namespace", "is_redirect"], sep)?;

    pl.item_name("page");
    pl.expected_updates(None);
    pl.start(format!("Reading pages from {}...", path.display()));

    let mut all_page_ids = Vec::new();
    let mut candidates: Vec<(i64, String)> = Vec::new();
    while let Some((line_number, line)) = lines.next_line()? {
        let row = parse_page_row(&line, sep)
            .ok_or_else(|| bad_row(path, line_number, "malformed pages row"))?;
        all_page_ids.push(row.page_id);
        if row.namespace == 0 && !row.is_redirect {
            candidates.push((row.page_id, row.title));
        }
        pl.light_update();
    }
    pl.done();

    all_page_ids.sort_unstable();
    if all_page_ids.windows(2).any(|w| w[0] == w[1]) {
        return Err(Error::bad_snapshot(format!(
            "duplicate page_id in {}",
            path.display()
        )));
    }
    candidates.sort_unstable_by_key(|(page_id, _)| *page_id);
    // NodeId is a u32 and the value V is reserved for the HALT sentinel
    if candidates.len() >= u32::MAX as usize {
        return Err(Error::bad_snapshot(format!(
            "too many nodes ({}) for 32-bit node ids",
            candidates.len()
        )));
    }
    log::info!(
        "{} pages, {} namespace-0 non-redirect nodes",
        all_page_ids.len(),
        candidates.len()
    );

    let mut page_ids = Vec::with_capacity(candidates.len());
    let mut titles = Vec::with_capacity(candidates.len());
    for (page_id, title) in candidates {
        page_ids.push(page_id);
        titles.push(title);
    }
    Ok((
        NodeMap::new(page_ids.into_boxed_slice(), titles.into_boxed_slice()),
        all_page_ids.into_boxed_slice(),
    ))
}

fn load_sequences(
    config: &SnapshotConfig,
    nodes: &NodeMap,
    all_page_ids: &[i64],
    pl: &mut impl ProgressLog,
) -> Result<CsrGraph> {
    let sep = config.separator;
    let path = &config.sequences;
    let mut lines = open_table(path, &["from_page_id", "position", "to_page_id"], sep)?;

    pl.item_name("link");
    pl.expected_updates(None);
    pl.start(format!("Reading link sequences from {}...", path.display()));

    let num_nodes = nodes.num_nodes();
    let mut offsets = vec![0u64; num_nodes + 1];
    let mut targets: Vec<NodeId> = Vec::new();
    // The last node whose slice start has been recorded in `offsets`;
    // sequences arrive grouped by from_page_id in node order.
    let mut last_node: i64 = -1;
    let mut prev_from = i64::MIN;
    let mut prev_position = 0;
    let mut dropped = 0u64;

    while let Some((line_number, line)) = lines.next_line()? {
        let mut fields = line.split(sep);
        let from = parse_field::<i64>(&mut fields)
            .ok_or_else(|| bad_row(path, line_number, "malformed from_page_id"))?;
        let position = parse_field::<i32>(&mut fields)
            .ok_or_else(|| bad_row(path, line_number, "malformed position"))?;
        let to = parse_field::<i64>(&mut fields)
            .ok_or_else(|| bad_row(path, line_number, "malformed to_page_id"))?;
        if fields.next().is_some() {
            return Err(bad_row(path, line_number, "too many columns"));
        }

        if from < prev_from {
            return Err(bad_row(
                path,
                line_number,
                "sequences not sorted by from_page_id",
            ));
        }
        if position <= 0 {
            return Err(bad_row(path, line_number, "non-positive position"));
        }
        let expected = if from == prev_from { prev_position + 1 } else { 1 };
        if position != expected {
            return Err(bad_row(
                path,
                line_number,
                "positions not dense and 1-based per page",
            ));
        }
        if all_page_ids.binary_search(&from).is_err() {
            return Err(bad_row(path, line_number, "from_page_id not in pages"));
        }
        prev_from = from;
        prev_position = position;

        // Pages that are not nodes keep their rows (they were validated
        // above) but contribute nothing to the graph.
        if let Some(node) = nodes.get(from) {
            let node = node as i64;
            if node != last_node {
                debug_assert!(node > last_node);
                for gap in last_node + 1..=node {
                    offsets[gap as usize] = targets.len() as u64;
                }
                last_node = node;
            }
            match nodes.get(to) {
                Some(target) => targets.push(target),
                // Dangling, redirect, or other-namespace target: the slot
                // is dropped and positions re-pack.
                None => dropped += 1,
            }
        } else {
            dropped += 1;
        }
        pl.light_update();
    }
    for gap in last_node + 1..=num_nodes as i64 {
        offsets[gap as usize] = targets.len() as u64;
    }
    pl.done();
    log::info!(
        "{} resolved links, {} dropped slots",
        targets.len(),
        dropped
    );

    Ok(CsrGraph::new(
        offsets.into_boxed_slice(),
        targets.into_boxed_slice(),
    ))
}

/// A line reader keeping track of line numbers, with the header already
/// consumed and validated.
struct TableLines {
    reader: BufReader<std::fs::File>,
    line_number: usize,
    buf: String,
}

impl TableLines {
    fn next_line(&mut self) -> Result<Option<(usize, String)>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            return Ok(Some((self.line_number, line.to_owned())));
        }
    }
}

fn open_table(path: &Path, columns: &[&str], sep: char) -> Result<TableLines> {
    let file = std::fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut header = String::new();
    if reader.read_line(&mut header)? == 0 {
        return Err(Error::bad_snapshot(format!("{}: empty table", path.display())));
    }
    let expected = columns.join(&sep.to_string());
    if header.trim_end_matches(['\n', '\r']) != expected {
        return Err(Error::bad_snapshot(format!(
            "{}: expected header {:?}",
            path.display(),
            expected
        )));
    }
    Ok(TableLines {
        reader,
        line_number: 1,
        buf: String::new(),
    })
}

fn bad_row(path: &Path, line_number: usize, msg: &str) -> Error {
    Error::bad_snapshot(format!("{}:{}: {}", path.display(), line_number, msg))
}

fn parse_field<T: std::str::FromStr>(fields: &mut std::str::Split<'_, char>) -> Option<T> {
    fields.next()?.parse().ok()
}

/// Parses a pages row. The title is delimited from both ends so that it
/// may contain the separator.
fn parse_page_row(line: &str, sep: char) -> Option<PageRow> {
    let (page_id, rest) = line.split_once(sep)?;
    let (rest, is_redirect) = rest.rsplit_once(sep)?;
    let (title, namespace) = rest.rsplit_once(sep)?;
    Some(PageRow {
        page_id: page_id.parse().ok()?,
        title: title.to_owned(),
        namespace: namespace.parse().ok()?,
        is_redirect: parse_bool(is_redirect)?,
    })
}

fn parse_bool(field: &str) -> Option<bool> {
    match field {
        "0" | "false" => Some(false),
        "1" | "true" => Some(true),
        _ => None,
    }
}
