// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Content hashing: the identity-independent fingerprint of an issue's
//! substantive fields, used by merge and import to detect real changes and
//! to recognize a renamed-but-unchanged issue.

use sha2::{Digest, Sha256};

use crate::issue::Issue;

/// Computes the deterministic content hash of an issue.
///
/// The hash covers title, description, status, priority, type, assignee,
/// design, acceptance criteria, notes, and external_ref (if set). It
/// excludes identity (`id`) and timestamps, so renaming an issue or
/// touching only `updated_at` never changes its content hash.
///
/// Fields are concatenated in a fixed order, each tagged with its field
/// name and length-prefixed, so that e.g. `title="ab" description="c"`
/// cannot collide with `title="a" description="bc"`.
pub fn content_hash(issue: &Issue) -> String {
    let mut buf = String::new();
    push_field(&mut buf, "title", &issue.title);
    push_field(&mut buf, "description", issue.description.as_deref().unwrap_or(""));
    push_field(&mut buf, "status", issue.status.as_str());
    push_field(&mut buf, "priority", &issue.priority.to_string());
    push_field(&mut buf, "type", issue.issue_type.as_str());
    push_field(&mut buf, "assignee", issue.assignee.as_deref().unwrap_or(""));
    push_field(&mut buf, "design", issue.design.as_deref().unwrap_or(""));
    push_field(
        &mut buf,
        "acceptance_criteria",
        issue.acceptance_criteria.as_deref().unwrap_or(""),
    );
    push_field(&mut buf, "notes", issue.notes.as_deref().unwrap_or(""));
    if let Some(ext) = &issue.external_ref {
        push_field(&mut buf, "external_ref", ext);
    }

    let digest = Sha256::digest(buf.as_bytes());
    hex::encode(digest)
}

fn push_field(buf: &mut String, name: &str, value: &str) {
    buf.push_str(name);
    buf.push(':');
    buf.push_str(&value.len().to_string());
    buf.push(':');
    buf.push_str(value);
    buf.push('\n');
}

/// Sets `issue.content_hash` to its freshly computed value and returns it.
pub fn refresh(issue: &mut Issue) -> String {
    let hash = content_hash(issue);
    issue.content_hash = Some(hash.clone());
    hash
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;
