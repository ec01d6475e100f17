// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::issue::{IssueType, Status};
use chrono::Utc;

fn base_issue() -> Issue {
    let now = Utc::now();
    Issue {
        id: "bd-abc123".into(),
        title: "Fix the thing".into(),
        description: Some("It is broken".into()),
        design: None,
        acceptance_criteria: None,
        notes: None,
        status: Status::Open,
        priority: 1,
        issue_type: IssueType::Bug,
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
        created_at: now,
        created_by: "alice".into(),
        updated_at: now,
        content_hash: None,
    }
}

#[test]
fn hash_is_deterministic() {
    let issue = base_issue();
    assert_eq!(content_hash(&issue), content_hash(&issue));
}

#[test]
fn hash_ignores_identity_and_timestamps() {
    let mut a = base_issue();
    let mut b = base_issue();
    a.id = "bd-one".into();
    b.id = "bd-two".into();
    b.updated_at = a.updated_at + chrono::Duration::days(1);
    b.created_at = a.created_at - chrono::Duration::days(1);
    assert_eq!(content_hash(&a), content_hash(&b));
}

#[test]
fn hash_changes_when_title_changes() {
    let a = base_issue();
    let mut b = base_issue();
    b.title = "A different title".into();
    assert_ne!(content_hash(&a), content_hash(&b));
}

#[test]
fn hash_changes_when_priority_changes() {
    let a = base_issue();
    let mut b = base_issue();
    b.priority = 5;
    assert_ne!(content_hash(&a), content_hash(&b));
}

#[test]
fn hash_distinguishes_field_boundary_ambiguity() {
    let mut a = base_issue();
    a.title = "ab".into();
    a.description = Some("c".into());
    let mut b = base_issue();
    b.title = "a".into();
    b.description = Some("bc".into());
    assert_ne!(content_hash(&a), content_hash(&b));
}

#[test]
fn hash_changes_when_external_ref_set() {
    let a = base_issue();
    let mut b = base_issue();
    b.external_ref = Some("https://example.com/issues/1".into());
    assert_ne!(content_hash(&a), content_hash(&b));
}

#[test]
fn refresh_populates_content_hash_field() {
    let mut issue = base_issue();
    assert!(issue.content_hash.is_none());
    let hash = refresh(&mut issue);
    assert_eq!(issue.content_hash, Some(hash));
}
