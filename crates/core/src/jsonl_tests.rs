// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TestRecord {
    id: u32,
    name: String,
}

#[test]
fn append_creates_file_if_missing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.jsonl");

    let record = TestRecord {
        id: 1,
        name: "first".into(),
    };
    append(&path, &record).unwrap();

    assert!(path.exists());
}

#[test]
fn read_all_returns_empty_for_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.jsonl");

    let records: Vec<TestRecord> = read_all(&path).unwrap();
    assert!(records.is_empty());
}

#[test]
fn append_and_read_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.jsonl");

    let r1 = TestRecord {
        id: 1,
        name: "first".into(),
    };
    let r2 = TestRecord {
        id: 2,
        name: "second".into(),
    };

    append(&path, &r1).unwrap();
    append(&path, &r2).unwrap();

    let records: Vec<TestRecord> = read_all(&path).unwrap();
    assert_eq!(records, vec![r1, r2]);
}

#[test]
fn read_all_skips_empty_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.jsonl");

    // Write content with empty lines manually
    std::fs::write(
        &path,
        "{\"id\":1,\"name\":\"a\"}\n\n{\"id\":2,\"name\":\"b\"}\n",
    )
    .unwrap();

    let records: Vec<TestRecord> = read_all(&path).unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn read_all_skips_malformed_line_and_keeps_the_rest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.jsonl");

    std::fs::write(
        &path,
        "{\"id\":1,\"name\":\"a\"}\nnot json at all\n{\"id\":2,\"name\":\"b\"}\n",
    )
    .unwrap();

    let records: Vec<TestRecord> = read_all(&path).unwrap();
    assert_eq!(
        records,
        vec![
            TestRecord { id: 1, name: "a".into() },
            TestRecord { id: 2, name: "b".into() },
        ]
    );
}

#[test]
fn write_all_replaces_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.jsonl");

    let r1 = TestRecord {
        id: 1,
        name: "first".into(),
    };
    append(&path, &r1).unwrap();

    let r2 = TestRecord {
        id: 2,
        name: "replaced".into(),
    };
    write_all(&path, &[r2.clone()]).unwrap();

    let records: Vec<TestRecord> = read_all(&path).unwrap();
    assert_eq!(records, vec![r2]);
}

#[test]
fn write_all_atomic_creates_target_with_owner_only_permissions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("issues.jsonl");

    let records = vec![TestRecord {
        id: 1,
        name: "first".into(),
    }];
    write_all_atomic(&path, &records).unwrap();

    assert!(path.exists());
    let read_back: Vec<TestRecord> = read_all(&path).unwrap();
    assert_eq!(read_back, records);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}

#[test]
fn write_all_atomic_leaves_no_temp_file_behind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("issues.jsonl");
    write_all_atomic(&path, &[TestRecord { id: 1, name: "x".into() }]).unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|ext| ext == "tmp").unwrap_or(false))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn write_all_atomic_overwrites_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("issues.jsonl");
    write_all_atomic(&path, &[TestRecord { id: 1, name: "old".into() }]).unwrap();
    write_all_atomic(&path, &[TestRecord { id: 2, name: "new".into() }]).unwrap();

    let records: Vec<TestRecord> = read_all(&path).unwrap();
    assert_eq!(records, vec![TestRecord { id: 2, name: "new".into() }]);
}

#[test]
fn read_lines_preserves_raw_non_json_trailer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conflicted.jsonl");
    std::fs::write(
        &path,
        "{\"id\":1,\"name\":\"a\"}\n<<<<<<< left\nraw conflict text\n=======\nother text\n>>>>>>> right\n",
    )
    .unwrap();

    let lines = read_lines(&path).unwrap();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[1], "<<<<<<< left");
}

#[test]
fn read_lines_returns_empty_for_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.jsonl");
    assert!(read_lines(&path).unwrap().is_empty());
}
