// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The merge-driver entry point a version-control hook calls directly
//! against three text-file snapshots, with no daemon involved (§2's "External
//! callers ... invoke the three-way merge or import engine directly against
//! a text file without the daemon"). Labels and comments have no per-field
//! merge rule in the core spec; this driver unions labels and concatenates
//! comments deduplicated by `(author, timestamp, text)`, preferring the
//! side whose issue record `merge::merge` actually kept wherever that's
//! unambiguous and falling back to a union otherwise.

use std::collections::HashMap;
use std::path::Path;

use wk_core::export::ExportRecord;
use wk_core::issue::{Comment, Issue};
use wk_core::merge::{self, MergeOptions};
use wk_core::{jsonl, Result};

pub struct MergeOutcome {
    pub merged_count: usize,
    pub conflict_count: usize,
}

/// Reads `base`, `left`, `right` as exported JSONL streams, merges them,
/// and writes the merged stream (plus any conflict marker blocks) to
/// `output`.
pub fn run(base: &Path, left: &Path, right: &Path, output: &Path, opts: &MergeOptions) -> Result<MergeOutcome> {
    let base_records: Vec<ExportRecord> = jsonl::read_all(base)?;
    let left_records: Vec<ExportRecord> = jsonl::read_all(left)?;
    let right_records: Vec<ExportRecord> = jsonl::read_all(right)?;

    let base_issues: Vec<Issue> = base_records.iter().map(|r| r.issue.clone()).collect();
    let left_issues: Vec<Issue> = left_records.iter().map(|r| r.issue.clone()).collect();
    let right_issues: Vec<Issue> = right_records.iter().map(|r| r.issue.clone()).collect();

    let (merged_issues, conflicts) = merge::merge(&base_issues, &left_issues, &right_issues, opts);

    let base_deps: Vec<_> = base_records.iter().flat_map(|r| r.dependencies.clone()).collect();
    let left_deps: Vec<_> = left_records.iter().flat_map(|r| r.dependencies.clone()).collect();
    let right_deps: Vec<_> = right_records.iter().flat_map(|r| r.dependencies.clone()).collect();
    let merged_deps = merge::merge_dependencies(&base_deps, &left_deps, &right_deps);

    let left_by_id: HashMap<&str, &ExportRecord> = left_records.iter().map(|r| (r.issue.id.as_str(), r)).collect();
    let right_by_id: HashMap<&str, &ExportRecord> = right_records.iter().map(|r| (r.issue.id.as_str(), r)).collect();

    let merged_records: Vec<ExportRecord> = merged_issues
        .into_iter()
        .map(|issue| {
            let dependencies = merged_deps.iter().filter(|d| d.issue_id == issue.id).cloned().collect();
            let left_side = left_by_id.get(issue.id.as_str());
            let right_side = right_by_id.get(issue.id.as_str());
            let labels = union_labels(left_side.map(|r| r.labels.as_slice()), right_side.map(|r| r.labels.as_slice()));
            let comments = union_comments(
                left_side.map(|r| r.comments.as_slice()),
                right_side.map(|r| r.comments.as_slice()),
            );
            ExportRecord {
                issue,
                dependencies,
                labels,
                comments,
            }
        })
        .collect();

    jsonl::write_all_atomic(output, &merged_records)?;
    if !conflicts.is_empty() {
        use std::io::Write as _;
        let markers = merge::render_conflict_markers(&conflicts);
        let mut file = std::fs::OpenOptions::new().append(true).open(output)?;
        file.write_all(markers.as_bytes())?;
    }

    Ok(MergeOutcome {
        merged_count: merged_records.len(),
        conflict_count: conflicts.len(),
    })
}

fn union_labels(left: Option<&[String]>, right: Option<&[String]>) -> Vec<String> {
    let mut out: Vec<String> = left.unwrap_or_default().to_vec();
    for label in right.unwrap_or_default() {
        if !out.contains(label) {
            out.push(label.clone());
        }
    }
    out.sort();
    out
}

fn union_comments(left: Option<&[Comment]>, right: Option<&[Comment]>) -> Vec<Comment> {
    let mut out: Vec<Comment> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for comment in left.unwrap_or_default().iter().chain(right.unwrap_or_default().iter()) {
        let key = (comment.author.clone(), comment.created_at, comment.text.clone());
        if seen.insert(key) {
            out.push(comment.clone());
        }
    }
    out.sort_by_key(|c| c.created_at);
    out
}

#[cfg(test)]
#[path = "merge_driver_tests.rs"]
mod tests;
