// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The import engine: reconciles a stream of incoming issue records against
//! a workspace's store, optionally renaming prefixes first, and reports
//! exactly what it did so callers can decide whether to re-export.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::db::Store;
use crate::error::Result;
use crate::hash;
use crate::id;
use crate::issue::Issue;

/// What happened to one incoming issue during import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    Created,
    Updated,
    /// Content-identical to the stored row; no write performed.
    Unchanged,
    /// A match was found but the incoming side lost on timestamp precedence
    /// or snapshot protection.
    Skipped,
}

/// Summary of one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub skipped: Vec<String>,
    /// Local issues absent from the incoming stream. Always empty in
    /// practice (unlisted-local preservation means nothing is purged) but
    /// kept on the report so callers can see what would have been dropped
    /// by a naive importer, matching the shape of the other outcome lists.
    pub purged: Vec<String>,
    /// Every prefix rename applied: old id -> new id.
    pub id_mapping: HashMap<String, String>,
}

impl ImportReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.id_mapping.is_empty()
    }
}

/// Options controlling one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// If set, incoming issues whose prefix differs from this workspace
    /// prefix are rewritten to it before collision detection, along with
    /// every boundary-aware mention of their old id in free text.
    pub rename_prefix: Option<String>,
    /// `id -> local_snapshot_updated_at`: issues this workspace itself
    /// exported, guarding against an import applying an older remote
    /// version over a local copy that has since moved on.
    pub snapshot_protection: HashMap<String, DateTime<Utc>>,
}

/// Runs the import pipeline against `store`, consuming `incoming`.
///
/// Order: prefix rename, hierarchical ordering (parents before children),
/// collision classification, timestamp precedence, snapshot protection,
/// unlisted-local preservation (never purges). Idempotent: importing the
/// same `incoming` twice against the resulting store produces an empty
/// report the second time.
pub fn import(store: &mut Store, incoming: Vec<Issue>, opts: &ImportOptions, actor: &str) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    let mut incoming = incoming;
    if let Some(new_prefix) = &opts.rename_prefix {
        rename_prefixes(&mut incoming, new_prefix, &mut report.id_mapping);
    }

    incoming.sort_by(|a, b| {
        let depth_a = id::depth(&a.id);
        let depth_b = id::depth(&b.id);
        depth_a.cmp(&depth_b).then_with(|| a.id.cmp(&b.id))
    });

    for mut issue in incoming {
        let existing = match &issue.external_ref {
            Some(ext) => store.get_by_external_ref(ext)?,
            None => None,
        };
        let existing = match existing {
            Some(e) => Some(e),
            None => {
                if store.issue_exists(&issue.id)? {
                    Some(store.get(&issue.id)?)
                } else {
                    find_by_content_hash(store, &issue)?
                }
            }
        };

        let Some(existing) = existing else {
            store.create(issue.clone(), actor)?;
            report.created.push(issue.id.clone());
            continue;
        };

        // Rename: content hash matches a row living under a different id.
        // Import it in place under the existing id rather than create+delete.
        if existing.id != issue.id {
            report
                .id_mapping
                .insert(issue.id.clone(), existing.id.clone());
            issue.id = existing.id.clone();
        }

        hash::refresh(&mut issue);
        if issue.content_hash == existing.content_hash {
            report.unchanged.push(existing.id.clone());
            continue;
        }

        if let Some(snapshot_ts) = opts.snapshot_protection.get(&existing.id) {
            if issue.updated_at <= *snapshot_ts {
                report.skipped.push(existing.id.clone());
                continue;
            }
        }

        if issue.updated_at <= existing.updated_at {
            report.skipped.push(existing.id.clone());
            continue;
        }

        overwrite(store, issue.clone())?;
        report.updated.push(existing.id.clone());
    }

    Ok(report)
}

/// Finds a stored issue with the same content hash under a different id:
/// the "rename" collision case. Only worth paying for when the incoming id
/// itself isn't already present, so `import` calls this as a fallback.
fn find_by_content_hash(store: &Store, issue: &Issue) -> Result<Option<Issue>> {
    let computed = hash::content_hash(issue);
    for stored in store.all_issues()? {
        if stored.content_hash.as_deref() == Some(computed.as_str()) {
            return Ok(Some(stored));
        }
    }
    Ok(None)
}

/// Overwrites the stored row for `issue.id` wholesale: import applies the
/// incoming record directly rather than going through the sparse
/// [`crate::issue::IssueUpdate`] builder, since every field is already
/// known.
fn overwrite(store: &mut Store, issue: Issue) -> Result<()> {
    let update = crate::issue::IssueUpdate {
        title: Some(issue.title),
        description: Some(issue.description),
        design: Some(issue.design),
        acceptance_criteria: Some(issue.acceptance_criteria),
        notes: Some(issue.notes),
        status: Some(issue.status),
        priority: Some(issue.priority),
        issue_type: Some(issue.issue_type),
        assignee: Some(issue.assignee),
        external_ref: Some(issue.external_ref),
        pinned: Some(issue.pinned),
        template: Some(issue.template),
        mol_type: Some(issue.mol_type),
        due_at: Some(issue.due_at),
        defer_until: Some(issue.defer_until),
        claim: None,
    };
    store.update(&issue.id, &update, "import")?;
    Ok(())
}

/// Rewrites every incoming issue's id whose prefix differs from
/// `new_prefix`, and every boundary-aware textual mention of an old id, in
/// place. Longer ids are matched first so one id is never a prefix-match
/// substring rewrite of another.
fn rename_prefixes(issues: &mut [Issue], new_prefix: &str, id_mapping: &mut HashMap<String, String>) {
    let mut renames: Vec<(String, String)> = Vec::new();
    for issue in issues.iter_mut() {
        if let Some(prefix) = id::prefix_of(&issue.id) {
            if prefix != new_prefix {
                if let Some(renamed) = id::rename_prefix(&issue.id, prefix, new_prefix) {
                    renames.push((issue.id.clone(), renamed.clone()));
                    id_mapping.insert(issue.id.clone(), renamed.clone());
                    issue.id = renamed;
                }
            }
        }
    }
    if renames.is_empty() {
        return;
    }

    // Longest-old-id first so e.g. "bd-1.2" is rewritten before "bd-1".
    renames.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    let pattern = boundary_pattern(&renames.iter().map(|(old, _)| old.clone()).collect::<Vec<_>>());

    for issue in issues.iter_mut() {
        rewrite_owned(&mut issue.title, &pattern, &renames);
        if let Some(s) = &mut issue.description {
            rewrite_owned(s, &pattern, &renames);
        }
        if let Some(s) = &mut issue.design {
            rewrite_owned(s, &pattern, &renames);
        }
        if let Some(s) = &mut issue.acceptance_criteria {
            rewrite_owned(s, &pattern, &renames);
        }
        if let Some(s) = &mut issue.notes {
            rewrite_owned(s, &pattern, &renames);
        }
    }
}

fn rewrite_owned(text: &mut String, pattern: &Option<Regex>, renames: &[(String, String)]) {
    let Some(re) = pattern else { return };
    let lookup: HashMap<&str, &str> = renames
        .iter()
        .map(|(old, new)| (old.as_str(), new.as_str()))
        .collect();
    let rewritten = re.replace_all(text, |caps: &regex::Captures| {
        let matched = &caps[1];
        lookup.get(matched).copied().unwrap_or(matched).to_string()
    });
    *text = rewritten.into_owned();
}

/// Builds a regex matching any of `old_ids` at a word boundary on both
/// sides, so a rename never corrupts an id that merely contains another as
/// a substring (e.g. `bd-1` inside `bd-1.2`). Every id both starts and ends
/// on a word character (the prefix's first letter, the suffix's last
/// alphanumeric), so `\b` alone is a correct boundary test here without
/// needing the `regex` crate's unsupported lookaround. Callers must supply
/// `old_ids` longest-first so a longer id is preferred at a shared start
/// position.
fn boundary_pattern(old_ids: &[String]) -> Option<Regex> {
    if old_ids.is_empty() {
        return None;
    }
    let escaped: Vec<String> = old_ids.iter().map(|id| regex::escape(id)).collect();
    let body = escaped.join("|");
    Regex::new(&format!(r"\b({body})\b")).ok()
}

/// Renames every dependency edge referencing a renamed id, leaving edges
/// between issues that weren't renamed untouched.
pub fn rename_dependency_ids(
    deps: &mut [crate::issue::Dependency],
    id_mapping: &HashMap<String, String>,
) {
    for dep in deps.iter_mut() {
        if let Some(new_id) = id_mapping.get(&dep.issue_id) {
            dep.issue_id = new_id.clone();
        }
        if let Some(new_id) = id_mapping.get(&dep.depends_on_id) {
            dep.depends_on_id = new_id.clone();
        }
    }
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
