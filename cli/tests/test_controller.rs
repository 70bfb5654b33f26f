/*
 * SPDX-FileCopyrightText: 2025 Inria
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use dsi_progress_logger::prelude::*;
use nlinkgraph::snapshot::{load, Snapshot, SnapshotConfig};
use nlinkgraph::utils::CancelFlag;
use nlinkgraph_cli::controller::{run_plan, CycleSelection, Outputs, Plan};
use nlinkgraph_cli::sink::{schema, Sink};
use nlinkgraph_cli::GlobalArgs;
use std::io::Write;
use std::path::Path;

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

fn plan(output_dir: &Path) -> Plan {
    Plan {
        n_set: vec![1, 2],
        output_dir: output_dir.to_owned(),
        cycles: CycleSelection::TopK(2),
        outputs: Outputs::default(),
        basin_budget: None,
        basin_parents: false,
        score_constant: 10.0,
        num_threads: 2,
    }
}

fn global_args() -> GlobalArgs {
    GlobalArgs { log_interval: None }
}

#[test]
fn test_full_plan() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let out = dir.path().join("out");

    run_plan(&snapshot, &plan(&out), &CancelFlag::new(), &global_args())?;

    // Per-N artifacts
    let cycles_1 = Sink::read_rows(out.join(schema::cycles_file(1)))?;
    assert_eq!(cycles_1.len(), 3);
    let cycles_2 = Sink::read_rows(out.join(schema::cycles_file(2)))?;
    assert!(cycles_2.is_empty());
    let assignments_1 = Sink::read_rows(out.join(schema::basin_assignments_file(1)))?;
    assert_eq!(
        assignments_1,
        vec![
            vec!["100", "100", "0", "cycle"],
            vec!["101", "100", "0", "cycle"],
            vec!["102", "103", "1", "cycle"],
            vec!["103", "103", "0", "cycle"],
            vec!["104", "100", "1", "cycle"],
        ]
    );

    // Both cycles of layer 1 were materialized (top-2)
    let members = Sink::read_rows(out.join(schema::basin_members_file(1, 100)))?;
    assert_eq!(
        members,
        vec![vec!["100", "0"], vec!["101", "0"], vec!["104", "1"]]
    );
    let layers = Sink::read_rows(out.join(schema::basin_layers_file(1, 103)))?;
    assert_eq!(layers, vec![vec!["0", "1"], vec!["1", "1"]]);

    // Branches: entry 100 is fed by 104, entry 103 by 102; 101 is not an
    // entry (its only predecessor is on the cycle)
    let branches = Sink::read_rows(out.join(schema::branches_file(1, 100)))?;
    assert_eq!(branches, vec![vec!["100", "104", "1", "1"]]);
    let branches = Sink::read_rows(out.join(schema::branches_file(1, 103)))?;
    assert_eq!(branches, vec![vec!["103", "102", "1", "1"]]);

    // Multiplex artifacts
    let multiplex = Sink::read_rows(out.join(schema::MULTIPLEX_FILE))?;
    assert_eq!(multiplex.len(), 10);
    assert_eq!(multiplex[0], vec!["100", "1", "100", "0", "cycle"]);
    assert_eq!(multiplex[1], vec!["100", "2", "", "", "halt"]);

    // No node changes cycle between the layers (one is all-HALT)
    let tunnels = Sink::read_rows(out.join(schema::TUNNELS_FILE))?;
    assert!(tunnels.is_empty());

    let connectivity = Sink::read_rows(out.join(schema::CONNECTIVITY_FILE))?;
    assert_eq!(
        connectivity,
        vec![
            vec!["1", "1", "5", "0"],
            vec!["1", "2", "0", "5"],
            vec!["2", "1", "0", "5"],
            vec!["2", "2", "5", "0"],
        ]
    );
    Ok(())
}

#[test]
fn test_checkpoint_skip_and_recompute() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let out = dir.path().join("out");
    let plan = plan(&out);

    run_plan(&snapshot, &plan, &CancelFlag::new(), &global_args())?;
    let before = Sink::read_rows(out.join(schema::basin_assignments_file(1)))?;

    // Corrupt one artifact: it fails the schema check and is recomputed,
    // while every other artifact is skipped
    std::fs::write(
        out.join(schema::basin_assignments_file(1)),
        "stale\theader\n",
    )?;
    run_plan(&snapshot, &plan, &CancelFlag::new(), &global_args())?;
    let after = Sink::read_rows(out.join(schema::basin_assignments_file(1)))?;
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn test_basin_parents_plan() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let out = dir.path().join("out");
    let plan = Plan {
        basin_parents: true,
        ..plan(&out)
    };

    run_plan(&snapshot, &plan, &CancelFlag::new(), &global_args())?;
    let members = Sink::read_rows(out.join(schema::basin_members_file(1, 100)))?;
    assert_eq!(
        members,
        vec![
            vec!["100", "0", "100"],
            vec!["101", "0", "101"],
            vec!["104", "1", "100"],
        ]
    );
    Ok(())
}

#[test]
fn test_explicit_cycle_selection() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let out = dir.path().join("out");
    let plan = Plan {
        // Page 101 is a member of the cycle with id 100; page 102 is not
        // on any cycle and is skipped with a warning
        cycles: CycleSelection::Pages(vec![101, 102]),
        n_set: vec![1],
        ..plan(&out)
    };

    run_plan(&snapshot, &plan, &CancelFlag::new(), &global_args())?;
    assert!(out.join(schema::basin_members_file(1, 100)).exists());
    assert!(!out.join(schema::basin_members_file(1, 103)).exists());
    Ok(())
}

#[test]
fn test_cancelled_plan() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let out = dir.path().join("out");
    let cancel = CancelFlag::new();
    cancel.cancel();

    let error = run_plan(&snapshot, &plan(&out), &cancel, &global_args()).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<nlinkgraph::Error>(),
        Some(nlinkgraph::Error::Cancelled)
    ));
    assert_eq!(nlinkgraph_cli::exit_code(&error), 4);
    Ok(())
}

#[test]
fn test_invalid_rule_in_plan() -> Result<()> {
    // A plan read from JSON bypasses the CLI value parsers; N = 0 must
    // still surface as a typed validation error, not a panic
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let out = dir.path().join("out");
    let plan = Plan {
        n_set: vec![0, 1],
        ..plan(&out)
    };

    let error = run_plan(&snapshot, &plan, &CancelFlag::new(), &global_args()).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<nlinkgraph::Error>(),
        Some(nlinkgraph::Error::InvalidRule(0))
    ));
    assert_eq!(nlinkgraph_cli::exit_code(&error), 2);
    Ok(())
}

#[test]
fn test_determinism() -> Result<()> {
    // Two runs with the same snapshot and plan produce byte-identical
    // artifacts, independently of the thread count
    let dir = tempfile::tempdir()?;
    let snapshot = write_snapshot(dir.path())?;
    let out_a = dir.path().join("a");
    let out_b = dir.path().join("b");

    let plan_a = Plan {
        num_threads: 1,
        ..plan(&out_a)
    };
    let plan_b = Plan {
        num_threads: 4,
        ..plan(&out_b)
    };
    run_plan(&snapshot, &plan_a, &CancelFlag::new(), &global_args())?;
    run_plan(&snapshot, &plan_b, &CancelFlag::new(), &global_args())?;

    let mut names: Vec<String> = std::fs::read_dir(&out_a)?
        .map(|entry| Ok(entry?.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_>>()?;
    names.sort();
    assert!(!names.is_empty());
    for name in names {
        let bytes_a = std::fs::read(out_a.join(&name))?;
        let bytes_b = std::fs::read(out_b.join(&name))?;
        assert_eq!(bytes_a, bytes_b, "artifact {} differs", name);
    }
    Ok(())
}

#[test]
fn test_plan_from_json() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("plan.json");
    std::fs::write(
        &path,
        r#"{
            "n_set": [3, 4, 5],
            "output_dir": "/tmp/out",
            "cycles": { "top_k": 3 },
            "basin_budget": 1000000
        }"#,
    )?;
    let plan = Plan::from_path(&path)?;
    assert_eq!(plan.n_set, vec![3, 4, 5]);
    assert!(matches!(plan.cycles, CycleSelection::TopK(3)));
    assert_eq!(plan.basin_budget, Some(1_000_000));
    // serde defaults
    assert_eq!(plan.score_constant, 10.0);
    assert!(plan.outputs.per_n && plan.outputs.multiplex);
    assert_eq!(plan.num_threads, 0);
    assert!(!plan.basin_parents);
    Ok(())
}
