// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Issue identity: parsing, generation, and hierarchical structure of IDs.
//!
//! An issue ID is `<prefix>-<suffix>`. The prefix is a lowercase alphanumeric
//! workspace tag (e.g. `bd`, `vc`). The suffix is one of:
//! - a base-36 hash, 3-8 characters, all-letter only accepted at length 3
//! - a legacy all-decimal suffix of any length
//! - a hierarchical dot-path, e.g. `abc1.2.3`, where each dot nests one level
//!   of parent -> child, to a maximum depth of 3
//!
//! Dots denote parent -> child nesting: `abc1.2` is a child of `abc1`, and
//! reparenting an issue is done by rewriting the ID string itself.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// The maximum nesting depth of a hierarchical dot-path suffix (number of dots).
pub const MAX_HIERARCHY_DEPTH: usize = 3;

/// The parsed structure of an issue suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuffixKind {
    /// A base-36 hash, 3-8 characters.
    Hash,
    /// A legacy all-decimal suffix.
    Decimal,
    /// A hierarchical dot-path: `root.seg1[.seg2[.seg3]]`.
    Hierarchical { segments: Vec<String> },
}

/// A parsed issue ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedId {
    pub prefix: String,
    pub suffix: String,
    pub kind: SuffixKind,
}

impl ParsedId {
    /// Depth of hierarchical nesting (0 for a flat ID).
    pub fn depth(&self) -> usize {
        match &self.kind {
            SuffixKind::Hierarchical { segments } => segments.len().saturating_sub(1),
            _ => 0,
        }
    }

    /// The parent ID, if this is a hierarchical child.
    pub fn parent(&self) -> Option<String> {
        match &self.kind {
            SuffixKind::Hierarchical { segments } if segments.len() > 1 => {
                let parent_suffix = segments[..segments.len() - 1].join(".");
                Some(format!("{}-{}", self.prefix, parent_suffix))
            }
            _ => None,
        }
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

fn is_base36_hash(suffix: &str) -> bool {
    if suffix.len() < 3 || suffix.len() > 8 {
        return false;
    }
    if !suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return false;
    }
    let all_letters = suffix.chars().all(|c| c.is_ascii_alphabetic());
    if all_letters && suffix.len() != 3 {
        return false;
    }
    true
}

fn is_decimal(suffix: &str) -> bool {
    !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit())
}

fn is_hierarchy_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

/// Parses a full issue ID into prefix and typed suffix.
pub fn parse(id: &str) -> Result<ParsedId> {
    let (prefix, suffix) = id
        .split_once('-')
        .ok_or_else(|| Error::InvalidId(id.to_string()))?;

    if !is_valid_prefix(prefix) {
        return Err(Error::InvalidId(id.to_string()));
    }
    if suffix.is_empty() {
        return Err(Error::InvalidId(id.to_string()));
    }

    if suffix.contains('.') {
        let segments: Vec<&str> = suffix.split('.').collect();
        if segments.len() - 1 > MAX_HIERARCHY_DEPTH {
            return Err(Error::InvalidId(id.to_string()));
        }
        let root = segments[0];
        if !(is_base36_hash(root) || is_decimal(root)) {
            return Err(Error::InvalidId(id.to_string()));
        }
        for seg in &segments[1..] {
            if !is_hierarchy_segment(seg) {
                return Err(Error::InvalidId(id.to_string()));
            }
        }
        return Ok(ParsedId {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            kind: SuffixKind::Hierarchical {
                segments: segments.into_iter().map(str::to_string).collect(),
            },
        });
    }

    if is_base36_hash(suffix) {
        return Ok(ParsedId {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            kind: SuffixKind::Hash,
        });
    }
    if is_decimal(suffix) {
        return Ok(ParsedId {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            kind: SuffixKind::Decimal,
        });
    }

    Err(Error::InvalidId(id.to_string()))
}

/// Returns true if `id` is a structurally valid issue ID.
pub fn is_valid(id: &str) -> bool {
    parse(id).is_ok()
}

/// Returns the prefix of an issue ID without full validation of the suffix shape.
pub fn prefix_of(id: &str) -> Option<&str> {
    id.split_once('-').map(|(p, _)| p)
}

/// Computes the nesting depth (number of dots) of an ID's suffix, 0 if flat
/// or the ID is malformed.
pub fn depth(id: &str) -> usize {
    parse(id).map(|p| p.depth()).unwrap_or(0)
}

/// Generates a new base-36 hash suffix from content, deterministic given
/// identical inputs. Used by `create` to mint a fresh ID; collisions are
/// resolved by the caller retrying with a salt.
pub fn generate_hash_suffix(title: &str, created_at: &DateTime<Utc>, salt: u32) -> String {
    let input = format!("{title}{}{salt}", created_at.to_rfc3339());
    let digest = Sha256::digest(input.as_bytes());
    to_base36(&digest, 6)
}

/// Generates a new issue ID with a unique base-36 hash suffix, retrying with
/// an incrementing salt on collision as reported by `exists`.
pub fn generate_unique_id<F>(prefix: &str, title: &str, created_at: &DateTime<Utc>, exists: F) -> String
where
    F: Fn(&str) -> bool,
{
    for salt in 0..u32::MAX {
        let suffix = generate_hash_suffix(title, created_at, salt);
        let id = format!("{prefix}-{suffix}");
        if !exists(&id) {
            return id;
        }
    }
    unreachable!("exhausted 2^32 salts generating a unique issue id")
}

fn to_base36(bytes: &[u8], len: usize) -> String {
    // Treat the leading bytes of the digest as a big-endian integer and
    // render it in base 36, left-padding with '0' to the requested length.
    let mut value: u128 = 0;
    for &b in bytes.iter().take(16) {
        value = (value << 8) | u128::from(b);
    }
    let mut chars = Vec::with_capacity(len);
    if value == 0 {
        chars.push(b'0');
    }
    while value > 0 && chars.len() < len {
        let digit = (value % 36) as usize;
        chars.push(BASE36_ALPHABET[digit]);
        value /= 36;
    }
    while chars.len() < len {
        chars.push(b'0');
    }
    chars.reverse();
    // Ensure not all-letters unless length 3: if it happened to land on an
    // all-letter string at a longer length, perturb the first character to
    // a digit to keep the suffix within the valid shape.
    if len != 3 && chars.iter().all(|c| c.is_ascii_alphabetic()) {
        chars[0] = b'0';
    }
    String::from_utf8(chars).unwrap_or_else(|_| "0".repeat(len))
}

/// Renames the prefix of a single ID, preserving suffix semantics. Returns
/// `None` if `id`'s prefix does not match `old_prefix`.
pub fn rename_prefix(id: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    let (prefix, suffix) = id.split_once('-')?;
    if prefix != old_prefix {
        return None;
    }
    Some(format!("{new_prefix}-{suffix}"))
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
