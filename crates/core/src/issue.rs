// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Core issue types: Issue, Status, IssueType, Dependency, Label, Comment,
//! and the mutation event emitted on every write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Classification of issues by their nature and scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Feature,
    Task,
    Bug,
    Chore,
    Idea,
    Epic,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Feature => "feature",
            IssueType::Task => "task",
            IssueType::Bug => "bug",
            IssueType::Chore => "chore",
            IssueType::Idea => "idea",
            IssueType::Epic => "epic",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "feature" => Ok(IssueType::Feature),
            "task" => Ok(IssueType::Task),
            "bug" => Ok(IssueType::Bug),
            "chore" => Ok(IssueType::Chore),
            "idea" => Ok(IssueType::Idea),
            "epic" => Ok(IssueType::Epic),
            _ => Err(Error::InvalidIssueType(s.to_string())),
        }
    }
}

/// Workflow status of an issue.
///
/// `Tombstone` is a soft-delete marker, not a terminal "done" state; it
/// counts as present for merge matching but is excluded from ordinary lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    InProgress,
    Blocked,
    Closed,
    Tombstone,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::Closed => "closed",
            Status::Tombstone => "tombstone",
        }
    }

    /// Ranks statuses for the merge rule: `closed` beats `open`, `tombstone`
    /// beats both as a safety fallback. Higher wins.
    pub fn merge_rank(&self) -> u8 {
        match self {
            Status::Tombstone => 3,
            Status::Closed => 2,
            Status::Blocked | Status::InProgress | Status::Open => 1,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Status::Open),
            "in_progress" => Ok(Status::InProgress),
            "blocked" => Ok(Status::Blocked),
            "closed" => Ok(Status::Closed),
            "tombstone" => Ok(Status::Tombstone),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// The relation a dependency edge expresses between two issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// `issue_id` cannot close while `depends_on_id` is open.
    Blocks,
    /// `depends_on_id` is the hierarchical parent of `issue_id`.
    ParentChild,
    /// Informational cross-reference, no readiness effect.
    Related,
    /// `issue_id` is a duplicate of `depends_on_id`.
    Duplicates,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Blocks => "blocks",
            DependencyType::ParentChild => "parent-child",
            DependencyType::Related => "related",
            DependencyType::Duplicates => "duplicates",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "blocks" => Ok(DependencyType::Blocks),
            "parent-child" | "parent_child" => Ok(DependencyType::ParentChild),
            "related" => Ok(DependencyType::Related),
            "duplicates" => Ok(DependencyType::Duplicates),
            _ => Err(Error::InvalidDependencyType(s.to_string())),
        }
    }
}

/// An edge `(issue, depends_on_issue, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub issue_id: String,
    pub depends_on_id: String,
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
}

impl Dependency {
    /// The `(issue, depends_on, type)` comparison key used by merge and
    /// import collision detection.
    pub fn key(&self) -> (&str, &str, DependencyType) {
        (&self.issue_id, &self.depends_on_id, self.dep_type)
    }
}

/// A `(issue, label)` membership pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub issue_id: String,
    pub name: String,
}

/// An append-only comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub issue_id: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
}

/// Primary entity: a trackable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: Status,
    /// 0 = most urgent; by convention 0 also means "unset" in merge/import
    /// comparisons, but it is always emitted in the text form (no
    /// `omitempty`, since 0 is itself a meaningful value to some callers).
    pub priority: i32,
    pub issue_type: IssueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub template: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mol_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defer_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_by_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_type: Option<IssueType>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl Issue {
    /// True if this issue is a gate: a waitable issue standing for an
    /// external condition, distinguished only by `mol_type`.
    pub fn is_gate(&self) -> bool {
        self.mol_type.as_deref() == Some("gate")
    }

    /// `status = closed` must imply `closed_at` is set, and vice versa.
    pub fn closed_invariant_holds(&self) -> bool {
        match self.status {
            Status::Closed => self.closed_at.is_some(),
            _ => self.closed_at.is_none(),
        }
    }

    /// `status = tombstone` implies `deleted_at` is set.
    pub fn tombstone_invariant_holds(&self) -> bool {
        match self.status {
            Status::Tombstone => self.deleted_at.is_some(),
            _ => true,
        }
    }
}

/// The kind of mutation a [`MutationEvent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    Comment,
    Status,
    /// A molecule step transitioned (step count changed).
    Bonded,
    /// A molecule completed all of its steps.
    Squashed,
    /// A gate was closed, releasing its waiters.
    Burned,
}

/// A single recorded mutation, broadcast over the daemon's bounded event
/// channel and replayable via `get_mutations(since_ms)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEvent {
    #[serde(rename = "type")]
    pub kind: MutationKind,
    pub issue_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_count: Option<u32>,
}

/// A sparse builder for `update`: each field is `Some` only when the caller
/// wants to change it, modeling the RPC's "bag of key/value pairs" update
/// shape as a typed builder rather than a map-of-any.
/// Fields that are themselves optional on [`Issue`] use `Option<Option<T>>`
/// so that `None` means "leave as is" and `Some(None)` means "clear".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub design: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub acceptance_criteria: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub issue_type: Option<IssueType>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub assignee: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub external_ref: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub template: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mol_type: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub due_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub defer_until: Option<Option<DateTime<Utc>>>,
    /// `update{claim: true}` shorthand: atomically set `assignee = actor`
    /// and `status = in_progress`, failing with [`Error::AlreadyClaimed`] if
    /// a different assignee already holds it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub claim: Option<bool>,
}

impl IssueUpdate {
    /// True if this update would touch no fields at all.
    pub fn is_empty(&self) -> bool {
        self == &IssueUpdate::default()
    }
}

/// Which of two compared sides should be kept by a "newer wins" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Compares two `updated_at` timestamps and reports which side wins under
/// "newer `updated_at` wins, ties prefer left" — shared by the merge and
/// import engines.
pub fn newer_wins(left: DateTime<Utc>, right: DateTime<Utc>) -> Side {
    if right > left {
        Side::Right
    } else {
        Side::Left
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
