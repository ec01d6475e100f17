// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Exercises `bd merge` end to end against real files on disk, with no
//! daemon involved — the same invocation shape a version-control merge
//! driver would use (§2).

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_line(path: &std::path::Path, json: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap_or_else(|e| panic!("open {}: {e}", path.display()));
    writeln!(file, "{json}").unwrap_or_else(|e| panic!("write: {e}"));
}

#[test]
fn merge_closed_vs_open_picks_closed_with_right_title() {
    let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let base = tmp.path().join("base.jsonl");
    let left = tmp.path().join("left.jsonl");
    let right = tmp.path().join("right.jsonl");
    let out = tmp.path().join("out.jsonl");

    write_line(
        &base,
        r#"{"id":"bd-1","title":"original","status":"open","priority":0,"issue_type":"task","created_at":"2024-01-01T00:00:00Z","created_by":"alice","updated_at":"2024-01-01T00:00:00Z"}"#,
    );
    write_line(
        &left,
        r#"{"id":"bd-1","title":"original","status":"closed","priority":0,"issue_type":"task","closed_at":"2024-01-02T00:00:00Z","created_at":"2024-01-01T00:00:00Z","created_by":"alice","updated_at":"2024-01-02T00:00:00Z"}"#,
    );
    write_line(
        &right,
        r#"{"id":"bd-1","title":"renamed","status":"open","priority":0,"issue_type":"task","created_at":"2024-01-01T00:00:00Z","created_by":"alice","updated_at":"2024-01-03T00:00:00Z"}"#,
    );

    Command::cargo_bin("bd")
        .unwrap_or_else(|e| panic!("cargo_bin: {e}"))
        .args([
            "merge",
            base.to_str().unwrap_or_else(|| panic!("utf8")),
            left.to_str().unwrap_or_else(|| panic!("utf8")),
            right.to_str().unwrap_or_else(|| panic!("utf8")),
            "--output",
            out.to_str().unwrap_or_else(|| panic!("utf8")),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("merged 1 issues, 0 conflicts"));

    let merged = std::fs::read_to_string(&out).unwrap_or_else(|e| panic!("read: {e}"));
    assert!(merged.contains(r#""status":"closed""#));
    assert!(merged.contains(r#""title":"renamed""#));
}
