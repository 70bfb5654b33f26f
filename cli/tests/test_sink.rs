/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use dsi_progress_logger::prelude::*;
use nlinkgraph::func::{classify, Classification, FuncGraph, ReverseGraph};
use nlinkgraph::snapshot::{load, Snapshot, SnapshotConfig};
use nlinkgraph::utils::CancelFlag;
use nlinkgraph_algo::basin::{materialize, BasinOptions};
use nlinkgraph_cli::sink::{schema, Sink};
use std::io::Write;
use std::path::Path;

/// Writes the five-node scenario graph as a snapshot with page ids
/// 100..=104.
fn write_snapshot(dir: &Path) -> Result<Snapshot> {
    let config = SnapshotConfig::new(dir);
    let mut pages = std::fs::File::create(&config.pages)?;
    writeln!(pages, "page_id\ttitle\tnamespace\tis_redirect")?;
    for (page_id, title) in [
        (100, "Alpha"),
        (101, "Beta"),
        (102, "Gamma"),
        (103, "Delta"),
        (104, "Epsilon"),
    ] {
        writeln!(pages, "{}\t{}\t0\t0", page_id, title)?;
    }
    let mut sequences = std::fs::File::create(&config.sequences)?;
    writeln!(sequences, "from_page_id\tposition\tto_page_id")?;
    for (from, links) in [
        (100, vec![101, 102]),
        (101, vec![100, 103]),
        (102, vec![103]),
        (103, vec![103, 104]),
        (104, vec![100]),
    ] {
        for (index, to) in links.iter().enumerate() {
            writeln!(sequences, "{}\t{}\t{}", from, index + 1, to)?;
        }
    }
    Ok(load(&config, no_logging![])?)
}

fn layer(snapshot: &Snapshot, n: u32) -> Result<(FuncGraph, Classification, ReverseGraph)> {
    let func = FuncGraph::new(snapshot.graph(), n);
    let classification = classify(&func, &CancelFlag::new(), no_logging![])?;
    let reverse = ReverseGraph::new(&func, &CancelFlag::new(), no_logging![])?;
    Ok((func, classification, reverse))
}

#[test]
fn test_write_cycles() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let (_, classification, _) = layer(&snapshot, 1)?;

    let sink = Sink::new(dir.path().join("out"))?;
    let path = sink.write_cycles(snapshot.nodes(), &classification)?;
    assert!(sink.is_valid(&schema::cycles_file(1), schema::CYCLES));

    let rows = Sink::read_rows(&path)?;
    assert_eq!(
        rows,
        vec![
            vec!["100", "2", "100", "0"],
            vec!["100", "2", "101", "1"],
            vec!["103", "1", "103", "0"],
        ]
    );
    Ok(())
}

#[test]
fn test_write_basin_assignments_with_halt() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let (_, classification, _) = layer(&snapshot, 2)?;

    let sink = Sink::new(dir.path().join("out"))?;
    let path = sink.write_basin_assignments(snapshot.nodes(), &classification)?;
    let rows = Sink::read_rows(&path)?;
    // At N = 2 every node halts: empty cycle_id and depth fields
    assert_eq!(rows.len(), 5);
    for (row, page_id) in rows.iter().zip([100, 101, 102, 103, 104]) {
        assert_eq!(row, &vec![page_id.to_string(), "".into(), "".into(), "halt".into()]);
    }
    Ok(())
}

#[test]
fn test_write_basin_members_and_layers() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let (func, classification, reverse) = layer(&snapshot, 1)?;
    let options = BasinOptions {
        parents: true,
        ..BasinOptions::default()
    };
    let basin = materialize(
        &func,
        &reverse,
        &classification,
        0,
        &options,
        &CancelFlag::new(),
        no_logging![],
    )?;

    let sink = Sink::new(dir.path().join("out"))?;
    let members = sink.write_basin_members(snapshot.nodes(), 1, &basin)?;
    let layers = sink.write_basin_layers(snapshot.nodes(), 1, &basin)?;

    assert!(sink.is_valid(
        &schema::basin_members_file(1, 100),
        schema::BASIN_MEMBERS_WITH_PARENTS
    ));
    assert_eq!(
        Sink::read_rows(&members)?,
        vec![
            vec!["100", "0", "100"],
            vec!["101", "0", "101"],
            vec!["104", "1", "100"],
        ]
    );
    assert_eq!(
        Sink::read_rows(&layers)?,
        vec![vec!["0", "2"], vec!["1", "1"]]
    );
    Ok(())
}

#[test]
fn test_header_validation() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let sink = Sink::new(dir.path())?;
    assert!(!sink.is_valid("missing.tsv", "a\tb"));

    std::fs::write(dir.path().join("bad.tsv"), "wrong\theader\n1\t2\n")?;
    assert!(!sink.is_valid("bad.tsv", "a\tb"));

    std::fs::write(dir.path().join("good.tsv"), "a\tb\n1\t2\n")?;
    assert!(sink.is_valid("good.tsv", "a\tb"));
    Ok(())
}

#[test]
fn test_atomic_overwrite() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let sink = Sink::new(dir.path().join("out"))?;

    let (_, classification, _) = layer(&snapshot, 1)?;
    let first = sink.write_cycles(snapshot.nodes(), &classification)?;
    let first_rows = Sink::read_rows(&first)?;

    // Writing again replaces the file with identical content: writers
    // are deterministic and the rename is atomic
    let second = sink.write_cycles(snapshot.nodes(), &classification)?;
    assert_eq!(first, second);
    assert_eq!(first_rows, Sink::read_rows(&second)?);

    // No temporary files are left behind
    let leftovers: Vec<_> = std::fs::read_dir(sink.dir())?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            !entry
                .file_name()
                .to_string_lossy()
                .ends_with(".tsv")
        })
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}
