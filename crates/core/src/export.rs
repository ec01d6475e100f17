// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Export: serializes the store to one record-per-line JSON text file,
//! enriched with each issue's dependencies, labels, and comments, per §6's
//! wire format. Export is atomic (temp file + rename, 0600) and clears the
//! dirty set for every exported ID on success.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::db::Store;
use crate::error::Result;
use crate::issue::{Comment, Dependency, Issue};
use crate::jsonl;

/// One exported line: the issue's own fields plus its nested sub-records.
/// `dependencies` lists only edges where this issue is the source
/// (`issue_id`), matching the import engine's expectation of one owning
/// record per edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportRecord {
    #[serde(flatten)]
    pub issue: Issue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

/// Whether a failed enrichment fetch (deps/labels/comments for one issue)
/// aborts the whole export or is recorded in the manifest and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportPolicy {
    Strict,
    #[default]
    AllowPartial,
}

impl ExportPolicy {
    fn as_str(self) -> &'static str {
        match self {
            ExportPolicy::Strict => "strict",
            ExportPolicy::AllowPartial => "allow_partial",
        }
    }
}

/// Sidecar manifest emitted alongside a partial export, per §3's "Export
/// manifest" entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportManifest {
    pub policy: String,
    pub exported_count: usize,
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_data: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Exports every issue (including tombstones), sorted by ID, to `path`.
///
/// Enrichment (dependencies/labels/comments) is fetched in one batched
/// query per class rather than per issue; under [`ExportPolicy::AllowPartial`]
/// a batched fetch failure downgrades that class to empty for every issue
/// in the export rather than aborting, and is recorded in the manifest.
pub fn export(store: &Store, path: &Path, policy: ExportPolicy) -> Result<ExportManifest> {
    let mut issues = store.all_issues()?;
    issues.sort_by(|a, b| a.id.cmp(&b.id));

    let ids: Vec<String> = issues.iter().map(|i| i.id.clone()).collect();

    let mut partial_data = Vec::new();
    let mut warnings = Vec::new();

    let deps_by_issue = match fetch_dependencies(store, &ids) {
        Ok(map) => map,
        Err(e) if policy == ExportPolicy::AllowPartial => {
            partial_data.push("dependencies".to_string());
            warnings.push(format!("dependencies fetch failed: {e}"));
            HashMap::new()
        }
        Err(e) => return Err(e),
    };
    let labels_by_issue = match store.labels_for_issues(&ids) {
        Ok(map) => map,
        Err(e) if policy == ExportPolicy::AllowPartial => {
            partial_data.push("labels".to_string());
            warnings.push(format!("labels fetch failed: {e}"));
            HashMap::new()
        }
        Err(e) => return Err(e),
    };
    let comments_by_issue = match store.comments_for_issues(&ids) {
        Ok(map) => map,
        Err(e) if policy == ExportPolicy::AllowPartial => {
            partial_data.push("comments".to_string());
            warnings.push(format!("comments fetch failed: {e}"));
            HashMap::new()
        }
        Err(e) => return Err(e),
    };

    let records: Vec<ExportRecord> = issues
        .into_iter()
        .map(|issue| {
            let dependencies = deps_by_issue.get(&issue.id).cloned().unwrap_or_default();
            let labels = labels_by_issue.get(&issue.id).cloned().unwrap_or_default();
            let comments = comments_by_issue.get(&issue.id).cloned().unwrap_or_default();
            ExportRecord {
                issue,
                dependencies,
                labels,
                comments,
            }
        })
        .collect();

    jsonl::write_all_atomic(path, &records)?;
    store.clear_dirty(&ids)?;

    Ok(ExportManifest {
        policy: policy.as_str().to_string(),
        exported_count: records.len(),
        complete: partial_data.is_empty(),
        partial_data,
        failed_issues: Vec::new(),
        warnings,
    })
}

fn fetch_dependencies(store: &Store, ids: &[String]) -> Result<HashMap<String, Vec<Dependency>>> {
    let mut out: HashMap<String, Vec<Dependency>> = HashMap::new();
    for dep in store.dependencies_for_issues(ids)? {
        out.entry(dep.issue_id.clone()).or_default().push(dep);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;
