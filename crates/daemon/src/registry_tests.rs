// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::tempdir;

fn entry(workspace: &str, pid: u32) -> RegistryEntry {
    RegistryEntry {
        workspace_path: workspace.to_string(),
        socket_path: format!("/tmp/beads-xyz/{workspace}.sock"),
        database_path: format!("{workspace}/.beads/issues.db"),
        pid,
        version: "0.4.0".to_string(),
        started_at: Utc::now(),
    }
}

#[test]
fn register_and_find_round_trip() {
    let dir = tempdir().unwrap();
    let registry = Registry::at(dir.path());
    let mine = entry("/workspace/a", std::process::id());

    registry.register(mine.clone()).unwrap();

    let found = registry.find(Path::new("/workspace/a")).unwrap();
    assert_eq!(found.map(|e| e.socket_path), Some(mine.socket_path));
}

#[test]
fn register_replaces_existing_entry_for_same_workspace() {
    let dir = tempdir().unwrap();
    let registry = Registry::at(dir.path());
    registry.register(entry("/workspace/a", std::process::id())).unwrap();

    let mut replacement = entry("/workspace/a", std::process::id());
    replacement.socket_path = "/tmp/beads-new/a.sock".to_string();
    registry.register(replacement.clone()).unwrap();

    let live = registry.list_live().unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].socket_path, replacement.socket_path);
}

#[test]
fn deregister_removes_entry() {
    let dir = tempdir().unwrap();
    let registry = Registry::at(dir.path());
    registry.register(entry("/workspace/a", std::process::id())).unwrap();

    registry.deregister("/workspace/a").unwrap();

    assert!(registry.list_live().unwrap().is_empty());
}

#[test]
fn dead_pid_entries_are_swept_on_list() {
    let dir = tempdir().unwrap();
    let registry = Registry::at(dir.path());
    // PID 1 << 30 is astronomically unlikely to be a live process.
    registry.register(entry("/workspace/dead", 1_000_000_000)).unwrap();

    let live = registry.list_live().unwrap();
    assert!(live.is_empty());
}

#[test]
fn corrupted_registry_file_is_treated_as_empty() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("registry.json"), "{not valid json").unwrap();
    let registry = Registry::at(dir.path());

    assert!(registry.list_live().unwrap().is_empty());
}

#[test]
fn empty_registry_file_is_treated_as_empty() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("registry.json"), "").unwrap();
    let registry = Registry::at(dir.path());

    assert!(registry.list_live().unwrap().is_empty());
}
