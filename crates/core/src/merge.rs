// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The three-way merge: a pure function reconciling three snapshots (common
//! ancestor, local, remote) of the issue stream into one merged stream plus
//! a list of conflicts that could not be resolved by the per-field rules
//! alone.
//!
//! Matching is nominally by `(id, created_at, created_by)` with a fallback
//! to `id` alone "to absorb timestamp drift across machines." Because a
//! well-formed snapshot never carries two records under the same `id`, the
//! two rules collapse to a single id-keyed lookup here; this is a
//! deliberate simplification, not an omission.
//!
//! Timestamps that fail to deserialize at all are not representable by
//! [`crate::issue::Issue`] (its fields are already a typed `DateTime<Utc>`)
//! and are treated as a fully absent record on that side by the text-file
//! codec, which degrades the same as the "valid beats invalid" rule by
//! routing through the existing live-vs-absent cases below.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::hash;
use crate::issue::{Dependency, DependencyType, Issue, Side, Status};

/// Tunables for a merge run: tombstone lifetime and the reference instant
/// used to judge it. Kept explicit (rather than reading the wall clock
/// inside `merge`) so the function stays pure and its tests deterministic.
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    pub ttl: Duration,
    pub clock_skew_grace: Duration,
    pub now: DateTime<Utc>,
}

/// Why a [`Conflict`] was recorded. Both kinds are resolved automatically
/// (the field rules are total), but surfaced for visibility because they
/// represent a real divergence rather than a routine simultaneous edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// One side deleted the issue outright while the other modified it.
    /// Deletion wins; this records which modification was discarded.
    DeleteVsModify,
    /// The same id was created independently on both sides with different
    /// content and no common ancestor.
    ConvergentCreation,
}

/// A recorded divergence, with enough context to render a conflict marker
/// block in the exported text file.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub issue_id: String,
    pub kind: ConflictKind,
    pub base: Option<Issue>,
    pub left: Option<Issue>,
    pub right: Option<Issue>,
}

/// Runs the three-way merge over whole snapshots of the issue stream.
/// Issues and dependencies are merged independently; the result is sorted
/// by id.
pub fn merge(
    base: &[Issue],
    left: &[Issue],
    right: &[Issue],
    opts: &MergeOptions,
) -> (Vec<Issue>, Vec<Conflict>) {
    let base_by_id = index_by_id(base);
    let left_by_id = index_by_id(left);
    let right_by_id = index_by_id(right);

    let mut ids: Vec<&String> = base_by_id
        .keys()
        .chain(left_by_id.keys())
        .chain(right_by_id.keys())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    ids.sort();

    let mut result = Vec::with_capacity(ids.len());
    let mut conflicts = Vec::new();

    for id in ids {
        let b = base_by_id.get(id);
        let l = left_by_id.get(id);
        let r = right_by_id.get(id);

        match merge_one(b, l, r, opts) {
            Outcome::Drop => {}
            Outcome::Keep(mut issue) => {
                hash::refresh(&mut issue);
                result.push(issue);
            }
            Outcome::KeepWithConflict(mut issue, kind) => {
                conflicts.push(Conflict {
                    issue_id: id.clone(),
                    kind,
                    base: b.cloned(),
                    left: l.cloned(),
                    right: r.cloned(),
                });
                hash::refresh(&mut issue);
                result.push(issue);
            }
            Outcome::DropWithConflict(kind) => {
                conflicts.push(Conflict {
                    issue_id: id.clone(),
                    kind,
                    base: b.cloned(),
                    left: l.cloned(),
                    right: r.cloned(),
                });
            }
        }
    }

    result.sort_by(|a, b| a.id.cmp(&b.id));
    (result, conflicts)
}

enum Outcome {
    Drop,
    Keep(Issue),
    KeepWithConflict(Issue, ConflictKind),
    DropWithConflict(ConflictKind),
}

fn merge_one(
    base: Option<&Issue>,
    left: Option<&Issue>,
    right: Option<&Issue>,
    opts: &MergeOptions,
) -> Outcome {
    let left_tomb = left.map(|i| i.status == Status::Tombstone).unwrap_or(false);
    let right_tomb = right.map(|i| i.status == Status::Tombstone).unwrap_or(false);

    if left_tomb && right_tomb {
        if let (Some(l), Some(r)) = (left, right) {
            return Outcome::Keep(merge_tombstones(l, r));
        }
    }
    if left_tomb && right.is_none() {
        if let Some(l) = left {
            return Outcome::Keep(l.clone());
        }
    }
    if right_tomb && left.is_none() {
        if let Some(r) = right {
            return Outcome::Keep(r.clone());
        }
    }
    if left_tomb && right.is_some() {
        if let (Some(l), Some(r)) = (left, right) {
            return Outcome::Keep(resolve_tombstone_vs_live(l, r, opts));
        }
    }
    if right_tomb && left.is_some() {
        if let (Some(l), Some(r)) = (left, right) {
            return Outcome::Keep(resolve_tombstone_vs_live(r, l, opts));
        }
    }

    match (base, left, right) {
        (Some(_), None, None) => Outcome::Drop,
        (None, Some(l), None) => Outcome::Keep(l.clone()),
        (None, None, Some(r)) => Outcome::Keep(r.clone()),
        (Some(b), Some(l), None) => {
            if l.content_hash_or_compute() != b.content_hash_or_compute() {
                Outcome::DropWithConflict(ConflictKind::DeleteVsModify)
            } else {
                Outcome::Drop
            }
        }
        (Some(b), None, Some(r)) => {
            if r.content_hash_or_compute() != b.content_hash_or_compute() {
                Outcome::DropWithConflict(ConflictKind::DeleteVsModify)
            } else {
                Outcome::Drop
            }
        }
        (None, Some(l), Some(r)) => {
            if l.content_hash_or_compute() == r.content_hash_or_compute() {
                Outcome::Keep(l.clone())
            } else {
                Outcome::KeepWithConflict(merge_fields(None, l, r), ConflictKind::ConvergentCreation)
            }
        }
        (Some(b), Some(l), Some(r)) => Outcome::Keep(merge_fields(Some(b), l, r)),
        (None, None, None) => Outcome::Drop,
    }
}

trait ContentHashOrCompute {
    fn content_hash_or_compute(&self) -> String;
}

impl ContentHashOrCompute for Issue {
    fn content_hash_or_compute(&self) -> String {
        self.content_hash
            .clone()
            .unwrap_or_else(|| hash::content_hash(self))
    }
}

fn merge_tombstones(left: &Issue, right: &Issue) -> Issue {
    match (left.deleted_at, right.deleted_at) {
        (Some(l), Some(r)) if r > l => right.clone(),
        (Some(_), Some(_)) => left.clone(),
        (Some(_), None) => left.clone(),
        (None, Some(_)) => right.clone(),
        (None, None) => left.clone(),
    }
}

/// One side is a tombstone, the other still live. The tombstone wins while
/// it's within its lifetime; otherwise the live side resurrects it.
fn resolve_tombstone_vs_live(tombstone: &Issue, live: &Issue, opts: &MergeOptions) -> Issue {
    let Some(deleted_at) = tombstone.deleted_at else {
        return live.clone();
    };
    let expires_at = deleted_at + opts.ttl + opts.clock_skew_grace;
    if opts.now <= expires_at {
        tombstone.clone()
    } else {
        live.clone()
    }
}

/// Applies the per-field rule table to two live sides. `base` is accepted
/// for the status-tiebreak rule but the rest of the table is a pure
/// pairwise comparison of `left` and `right`, independent of `base`.
fn merge_fields(base: Option<&Issue>, left: &Issue, right: &Issue) -> Issue {
    let mut out = left.clone();

    let text_side = newer_or_left(left.updated_at, right.updated_at);
    out.title = pick(text_side, &left.title, &right.title).clone();
    out.description = pick(text_side, &left.description, &right.description).clone();

    out.notes = merge_notes(left.notes.as_deref(), right.notes.as_deref());
    out.status = merge_status(base.map(|b| b.status), left.status, right.status);
    out.priority = merge_priority(left.priority, right.priority);
    out.issue_type = left.issue_type;
    out.updated_at = left.updated_at.max(right.updated_at);

    if out.status == Status::Closed {
        let closed_side = match (left.closed_at, right.closed_at) {
            (Some(l), Some(r)) if r > l => Side::Right,
            (None, Some(_)) => Side::Right,
            _ => Side::Left,
        };
        match closed_side {
            Side::Left => {
                out.closed_at = left.closed_at;
                out.close_reason = left.close_reason.clone();
                out.closed_by_session = left.closed_by_session.clone();
            }
            Side::Right => {
                out.closed_at = right.closed_at;
                out.close_reason = right.close_reason.clone();
                out.closed_by_session = right.closed_by_session.clone();
            }
        }
    } else {
        out.closed_at = None;
        out.close_reason = None;
        out.closed_by_session = None;
    }

    match (left.deleted_at, right.deleted_at) {
        (Some(l), Some(r)) if r > l => {
            out.deleted_at = right.deleted_at;
            out.deleted_by = right.deleted_by.clone();
            out.delete_reason = right.delete_reason.clone();
            out.original_type = right.original_type;
        }
        (Some(_), _) => {
            out.deleted_at = left.deleted_at;
            out.deleted_by = left.deleted_by.clone();
            out.delete_reason = left.delete_reason.clone();
            out.original_type = left.original_type;
        }
        (None, Some(_)) => {
            out.deleted_at = right.deleted_at;
            out.deleted_by = right.deleted_by.clone();
            out.delete_reason = right.delete_reason.clone();
            out.original_type = right.original_type;
        }
        (None, None) => {
            out.deleted_at = None;
            out.deleted_by = None;
            out.delete_reason = None;
            out.original_type = None;
        }
    }

    out.content_hash = None;
    out
}

fn pick<'a, T>(side: Side, left: &'a T, right: &'a T) -> &'a T {
    match side {
        Side::Left => left,
        Side::Right => right,
    }
}

fn newer_or_left(left: DateTime<Utc>, right: DateTime<Utc>) -> Side {
    if right > left {
        Side::Right
    } else {
        Side::Left
    }
}

fn merge_notes(left: Option<&str>, right: Option<&str>) -> Option<String> {
    let left = left.filter(|s| !s.is_empty());
    let right = right.filter(|s| !s.is_empty());
    match (left, right) {
        (None, None) => None,
        (Some(l), None) => Some(l.to_string()),
        (None, Some(r)) => Some(r.to_string()),
        (Some(l), Some(r)) if l == r => Some(l.to_string()),
        (Some(l), Some(r)) => Some(format!("{l}\n---\n{r}")),
    }
}

fn merge_status(base: Option<Status>, left: Status, right: Status) -> Status {
    if left.merge_rank() != right.merge_rank() {
        return if left.merge_rank() > right.merge_rank() {
            left
        } else {
            right
        };
    }
    if left == right {
        return left;
    }
    match base {
        Some(b) if b == left && b != right => right,
        Some(b) if b == right && b != left => left,
        _ => left,
    }
}

fn merge_priority(left: i32, right: i32) -> i32 {
    match (left == 0, right == 0) {
        (true, true) => 0,
        (true, false) => right,
        (false, true) => left,
        (false, false) => left.min(right),
    }
}

fn index_by_id(issues: &[Issue]) -> HashMap<String, Issue> {
    issues
        .iter()
        .map(|issue| (issue.id.clone(), issue.clone()))
        .collect()
}

/// Merges dependency sets across the three sides. Removal is authoritative:
/// an edge present in base and missing from either side is dropped even if
/// the other side still has it. Left's copy wins where both sides keep it.
pub fn merge_dependencies(
    base: &[Dependency],
    left: &[Dependency],
    right: &[Dependency],
) -> Vec<Dependency> {
    let base_keys: HashSet<_> = base.iter().map(dep_key).collect();
    let left_keys: HashSet<_> = left.iter().map(dep_key).collect();
    let right_keys: HashSet<_> = right.iter().map(dep_key).collect();

    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for dep in left.iter().chain(right.iter()) {
        let key = dep_key(dep);
        if !seen.insert(key.clone()) {
            continue;
        }
        let in_base = base_keys.contains(&key);
        let in_left = left_keys.contains(&key);
        let in_right = right_keys.contains(&key);
        if in_base && !(in_left && in_right) {
            continue;
        }
        let kept = if in_left {
            left.iter().find(|d| dep_key(d) == key)
        } else {
            right.iter().find(|d| dep_key(d) == key)
        };
        if let Some(kept) = kept {
            result.push(kept.clone());
        }
    }

    result.sort_by(|a, b| {
        (a.issue_id.as_str(), a.depends_on_id.as_str())
            .cmp(&(b.issue_id.as_str(), b.depends_on_id.as_str()))
    });
    result
}

fn dep_key(dep: &Dependency) -> (String, String, DependencyType) {
    (dep.issue_id.clone(), dep.depends_on_id.clone(), dep.dep_type)
}

/// Renders recorded conflicts as git-style conflict marker blocks, to be
/// appended after the merged records in the exported text file.
pub fn render_conflict_markers(conflicts: &[Conflict]) -> String {
    let mut out = String::new();
    for conflict in conflicts {
        out.push_str(&format!("<<<<<<< base ({})\n", conflict.issue_id));
        out.push_str(&render_side(conflict.base.as_ref()));
        out.push_str("||||||| local\n");
        out.push_str(&render_side(conflict.left.as_ref()));
        out.push_str("=======\n");
        out.push_str(&render_side(conflict.right.as_ref()));
        out.push_str(">>>>>>> remote\n");
    }
    out
}

fn render_side(issue: Option<&Issue>) -> String {
    match issue {
        Some(issue) => serde_json::to_string(issue).unwrap_or_default() + "\n",
        None => "(absent)\n".to_string(),
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
