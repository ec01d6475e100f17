// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::db::Store;
use crate::issue::{IssueType, Status};

fn t(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().to_utc()
}

fn issue(id: &str, title: &str, updated_at: DateTime<Utc>) -> Issue {
    Issue {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        design: None,
        acceptance_criteria: None,
        notes: None,
        status: Status::Open,
        priority: 0,
        issue_type: IssueType::Task,
        assignee: None,
        external_ref: None,
        pinned: false,
        template: false,
        mol_type: None,
        due_at: None,
        defer_until: None,
        closed_at: None,
        close_reason: None,
        closed_by_session: None,
        deleted_at: None,
        deleted_by: None,
        delete_reason: None,
        original_type: None,
        created_at: t("2024-01-01T00:00:00Z"),
        created_by: "alice".into(),
        updated_at,
        content_hash: None,
    }
}

#[test]
fn new_issue_is_created() {
    let mut store = Store::open_in_memory().unwrap();
    let incoming = vec![issue("bd-1", "First", t("2024-01-01T00:00:00Z"))];

    let report = import(&mut store, incoming, &ImportOptions::default(), "bob").unwrap();

    assert_eq!(report.created, vec!["bd-1".to_string()]);
    assert!(report.updated.is_empty());
    assert_eq!(store.get("bd-1").unwrap().title, "First");
}

#[test]
fn identical_content_is_unchanged() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .create(issue("bd-1", "First", t("2024-01-01T00:00:00Z")), "bob")
        .unwrap();

    let incoming = vec![issue("bd-1", "First", t("2024-01-01T00:00:00Z"))];
    let report = import(&mut store, incoming, &ImportOptions::default(), "bob").unwrap();

    assert_eq!(report.unchanged, vec!["bd-1".to_string()]);
    assert!(report.updated.is_empty());
}

#[test]
fn newer_incoming_update_applies() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .create(issue("bd-1", "First", t("2024-01-01T00:00:00Z")), "bob")
        .unwrap();

    let incoming = vec![issue("bd-1", "Revised", t("2024-02-01T00:00:00Z"))];
    let report = import(&mut store, incoming, &ImportOptions::default(), "bob").unwrap();

    assert_eq!(report.updated, vec!["bd-1".to_string()]);
    assert_eq!(store.get("bd-1").unwrap().title, "Revised");
}

#[test]
fn equal_timestamp_keeps_local_copy() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .create(issue("bd-1", "First", t("2024-01-01T00:00:00Z")), "bob")
        .unwrap();

    let incoming = vec![issue("bd-1", "Stale rewrite", t("2024-01-01T00:00:00Z"))];
    let report = import(&mut store, incoming, &ImportOptions::default(), "bob").unwrap();

    assert_eq!(report.skipped, vec!["bd-1".to_string()]);
    assert_eq!(store.get("bd-1").unwrap().title, "First");
}

#[test]
fn older_incoming_update_is_skipped() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .create(issue("bd-1", "Fresh local edit", t("2024-03-01T00:00:00Z")), "bob")
        .unwrap();

    let incoming = vec![issue("bd-1", "Stale remote copy", t("2024-01-01T00:00:00Z"))];
    let report = import(&mut store, incoming, &ImportOptions::default(), "bob").unwrap();

    assert_eq!(report.skipped, vec!["bd-1".to_string()]);
    assert_eq!(store.get("bd-1").unwrap().title, "Fresh local edit");
}

#[test]
fn snapshot_protection_blocks_older_than_snapshot() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .create(issue("bd-1", "Local", t("2024-01-01T00:00:00Z")), "bob")
        .unwrap();

    let mut opts = ImportOptions::default();
    opts.snapshot_protection
        .insert("bd-1".to_string(), t("2024-02-01T00:00:00Z"));

    // Incoming is newer than the stored row but older than what this
    // workspace itself already exported, so it must not win.
    let incoming = vec![issue("bd-1", "Remote replay", t("2024-01-15T00:00:00Z"))];
    let report = import(&mut store, incoming, &opts, "bob").unwrap();

    assert_eq!(report.skipped, vec!["bd-1".to_string()]);
}

#[test]
fn local_only_issues_are_never_purged() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .create(issue("bd-1", "Local only", t("2024-01-01T00:00:00Z")), "bob")
        .unwrap();

    let report = import(&mut store, Vec::new(), &ImportOptions::default(), "bob").unwrap();

    assert!(report.purged.is_empty());
    assert!(store.issue_exists("bd-1").unwrap());
}

#[test]
fn import_is_idempotent() {
    let mut store = Store::open_in_memory().unwrap();
    let incoming = vec![issue("bd-1", "First", t("2024-01-01T00:00:00Z"))];

    import(&mut store, incoming.clone(), &ImportOptions::default(), "bob").unwrap();
    let second = import(&mut store, incoming, &ImportOptions::default(), "bob").unwrap();

    assert!(second.created.is_empty());
    assert_eq!(second.unchanged, vec!["bd-1".to_string()]);
}

#[test]
fn prefix_rename_rewrites_id_and_text_mentions() {
    let mut store = Store::open_in_memory().unwrap();
    let mut parent = issue("old-1", "Parent", t("2024-01-01T00:00:00Z"));
    parent.description = Some("See old-1 for context".to_string());
    let incoming = vec![parent];

    let mut opts = ImportOptions::default();
    opts.rename_prefix = Some("new".to_string());

    let report = import(&mut store, incoming, &opts, "bob").unwrap();

    assert_eq!(
        report.id_mapping.get("old-1").map(String::as_str),
        Some("new-1")
    );
    let stored = store.get("new-1").unwrap();
    assert_eq!(stored.description.as_deref(), Some("See new-1 for context"));
}

#[test]
fn rename_does_not_corrupt_hierarchical_child_sharing_a_root() {
    let mut issues = vec![
        issue("old-1", "Parent", t("2024-01-01T00:00:00Z")),
        issue("old-1.2", "Child", t("2024-01-01T00:00:00Z")),
    ];
    let mut mapping = HashMap::new();
    rename_prefixes(&mut issues, "new", &mut mapping);

    assert_eq!(issues[0].id, "new-1");
    assert_eq!(issues[1].id, "new-1.2");
}

#[test]
fn hierarchical_ordering_sorts_parents_before_children() {
    let mut store = Store::open_in_memory().unwrap();
    let incoming = vec![
        issue("bd-1.2", "Child", t("2024-01-01T00:00:00Z")),
        issue("bd-1", "Parent", t("2024-01-01T00:00:00Z")),
    ];

    let report = import(&mut store, incoming, &ImportOptions::default(), "bob").unwrap();

    assert_eq!(report.created, vec!["bd-1".to_string(), "bd-1.2".to_string()]);
}
