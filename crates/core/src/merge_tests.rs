// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::issue::IssueType;
use chrono::TimeZone;

fn t(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().to_utc()
}

fn opts() -> MergeOptions {
    MergeOptions {
        ttl: Duration::days(90),
        clock_skew_grace: Duration::hours(24),
        now: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    }
}

fn base_issue(id: &str, status: Status, updated_at: DateTime<Utc>) -> Issue {
    Issue {
        id: id.to_string(),
        title: "Original title".into(),
        description: None,
        design: None,
        acceptance_criteria: None,
        notes: None,
        status,
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

/// Scenario 1: merge closed (left) vs open-with-new-title (right).
#[test]
fn merge_closed_vs_open_prefers_closed_status_and_right_title() {
    let base = vec![base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"))];

    let mut left = base_issue("bd-1", Status::Closed, t("2024-01-02T00:00:00Z"));
    left.closed_at = Some(t("2024-01-02T00:00:00Z"));
    let left = vec![left];

    let mut right = base_issue("bd-1", Status::Open, t("2024-01-03T00:00:00Z"));
    right.title = "New title from right".into();
    let right = vec![right];

    let (merged, conflicts) = merge(&base, &left, &right, &opts());

    assert_eq!(merged.len(), 1);
    let issue = &merged[0];
    assert_eq!(issue.status, Status::Closed);
    assert_eq!(issue.closed_at, Some(t("2024-01-02T00:00:00Z")));
    assert_eq!(issue.title, "New title from right");
    assert!(conflicts.is_empty());
}

/// Scenario 2: both sides tombstone at different times; later wins.
#[test]
fn merge_both_tombstones_keeps_later_deletion() {
    let base = vec![base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"))];

    let mut left = base_issue("bd-1", Status::Tombstone, t("2024-01-05T10:00:00Z"));
    left.deleted_at = Some(t("2024-01-05T10:00:00Z"));
    let left = vec![left];

    let mut right = base_issue("bd-1", Status::Tombstone, t("2024-01-05T11:00:00Z"));
    right.deleted_at = Some(t("2024-01-05T11:00:00Z"));
    let right = vec![right];

    let (merged, conflicts) = merge(&base, &left, &right, &opts());

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].deleted_at, Some(t("2024-01-05T11:00:00Z")));
    assert!(conflicts.is_empty());
}

/// Scenario 3: dependency removal beats modification.
#[test]
fn merge_dependency_removal_beats_modification() {
    let base_deps = vec![Dependency {
        issue_id: "bd-2".into(),
        depends_on_id: "bd-3".into(),
        dep_type: DependencyType::Blocks,
    }];
    let left_deps: Vec<Dependency> = Vec::new();
    let right_deps = base_deps.clone();

    let merged = merge_dependencies(&base_deps, &left_deps, &right_deps);
    assert!(merged.is_empty());
}

#[test]
fn merge_dependency_keeps_additions_from_either_side() {
    let base_deps: Vec<Dependency> = Vec::new();
    let left_deps = vec![Dependency {
        issue_id: "bd-1".into(),
        depends_on_id: "bd-2".into(),
        dep_type: DependencyType::Blocks,
    }];
    let right_deps = vec![Dependency {
        issue_id: "bd-1".into(),
        depends_on_id: "bd-4".into(),
        dep_type: DependencyType::Related,
    }];

    let merged = merge_dependencies(&base_deps, &left_deps, &right_deps);
    assert_eq!(merged.len(), 2);
}

#[test]
fn merge_dependency_left_metadata_wins_on_collision() {
    let base_deps: Vec<Dependency> = Vec::new();
    let left_deps = vec![Dependency {
        issue_id: "bd-1".into(),
        depends_on_id: "bd-2".into(),
        dep_type: DependencyType::Blocks,
    }];
    let right_deps = left_deps.clone();

    let merged = merge_dependencies(&base_deps, &left_deps, &right_deps);
    assert_eq!(merged, left_deps);
}

#[test]
fn merge_result_is_sorted_by_id() {
    let base: Vec<Issue> = Vec::new();
    let left = vec![
        base_issue("bd-3", Status::Open, t("2024-01-01T00:00:00Z")),
        base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z")),
    ];
    let right = vec![base_issue("bd-2", Status::Open, t("2024-01-01T00:00:00Z"))];

    let (merged, _) = merge(&base, &left, &right, &opts());
    let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["bd-1", "bd-2", "bd-3"]);
}

#[test]
fn merge_is_idempotent_under_reapplication() {
    let base = vec![base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"))];
    let left = vec![base_issue("bd-1", Status::Closed, t("2024-01-02T00:00:00Z"))];
    let right = vec![base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"))];

    let (first, _) = merge(&base, &left, &right, &opts());
    let (second, _) = merge(&first, &left, &right, &opts());
    assert_eq!(first, second);
}

#[test]
fn merge_of_identical_sides_returns_left_modulo_timestamp_max() {
    let issue = base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"));
    let base = vec![issue.clone()];
    let left = vec![issue.clone()];
    let right = vec![issue.clone()];

    let (merged, conflicts) = merge(&base, &left, &right, &opts());
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].title, issue.title);
    assert_eq!(merged[0].updated_at, issue.updated_at);
    assert!(conflicts.is_empty());
}

#[test]
fn priority_zero_is_unset_and_explicit_value_wins() {
    assert_eq!(merge_priority(0, 0), 0);
    assert_eq!(merge_priority(0, 3), 3);
    assert_eq!(merge_priority(2, 0), 2);
    assert_eq!(merge_priority(5, 2), 2);
}

#[test]
fn notes_concatenate_on_conflict() {
    assert_eq!(
        merge_notes(Some("left note"), Some("right note")),
        Some("left note\n---\nright note".to_string())
    );
    assert_eq!(merge_notes(Some("shared"), Some("shared")), Some("shared".to_string()));
    assert_eq!(merge_notes(None, Some("right only")), Some("right only".to_string()));
    assert_eq!(merge_notes(Some(""), None), None);
}

#[test]
fn resurrects_tombstone_after_ttl_and_grace_elapse() {
    let mut tombstone = base_issue("bd-1", Status::Tombstone, t("2024-01-01T00:00:00Z"));
    tombstone.deleted_at = Some(t("2024-01-01T00:00:00Z"));
    let live = base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"));

    let mut far_future = opts();
    far_future.now = t("2025-01-01T00:00:00Z");

    let resolved = resolve_tombstone_vs_live(&tombstone, &live, &far_future);
    assert_eq!(resolved.status, Status::Open);
}

#[test]
fn tombstone_wins_within_ttl_and_grace() {
    let mut tombstone = base_issue("bd-1", Status::Tombstone, t("2024-01-01T00:00:00Z"));
    tombstone.deleted_at = Some(t("2024-01-01T00:00:00Z"));
    let live = base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"));

    let resolved = resolve_tombstone_vs_live(&tombstone, &live, &opts());
    assert_eq!(resolved.status, Status::Tombstone);
}

#[test]
fn deletion_beats_modification_on_the_other_side() {
    let base = vec![base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"))];
    let mut left = base_issue("bd-1", Status::Open, t("2024-01-02T00:00:00Z"));
    left.title = "locally modified".into();
    let left = vec![left];
    let right: Vec<Issue> = Vec::new();

    let (merged, conflicts) = merge(&base, &left, &right, &opts());
    assert!(merged.is_empty());
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::DeleteVsModify);
}

#[test]
fn convergent_creation_with_identical_content_has_no_conflict() {
    let base: Vec<Issue> = Vec::new();
    let issue = base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"));
    let left = vec![issue.clone()];
    let right = vec![issue];

    let (merged, conflicts) = merge(&base, &left, &right, &opts());
    assert_eq!(merged.len(), 1);
    assert!(conflicts.is_empty());
}

#[test]
fn convergent_creation_with_different_content_is_recorded() {
    let base: Vec<Issue> = Vec::new();
    let left = vec![base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"))];
    let mut right_issue = base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"));
    right_issue.title = "A completely different issue".into();
    let right = vec![right_issue];

    let (merged, conflicts) = merge(&base, &left, &right, &opts());
    assert_eq!(merged.len(), 1);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::ConvergentCreation);
}

#[test]
fn render_conflict_markers_includes_all_three_sides() {
    let conflicts = vec![Conflict {
        issue_id: "bd-1".into(),
        kind: ConflictKind::ConvergentCreation,
        base: None,
        left: Some(base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"))),
        right: Some(base_issue("bd-1", Status::Open, t("2024-01-01T00:00:00Z"))),
    }];
    let rendered = render_conflict_markers(&conflicts);
    assert!(rendered.contains("<<<<<<< base"));
    assert!(rendered.contains("|||||||"));
    assert!(rendered.contains("======="));
    assert!(rendered.contains(">>>>>>> remote"));
}
