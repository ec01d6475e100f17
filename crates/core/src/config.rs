// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace configuration: `.beads/config.toml`, plus the store's own
//! config key-space (§4.1's get/set config) for values that must be visible
//! to every process sharing the store rather than just the one that read
//! the file — notably the auto-import fast-path cache (§4.7).
//!
//! Precedence is flag > env (`BD_*`) > config file > default (§6); this
//! module owns the file and env layers; CLI flags are layered on top by the
//! `bd` binary itself.

use std::fs;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Per-workspace configuration, loaded once per process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// The workspace's issue-ID prefix, e.g. `bd`. Used by the import
    /// engine's rename-on-import step and by `create` to mint new IDs.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Tombstone lifetime before a deletion is eligible for GC, and before
    /// merge lets a live edit resurrect it (§4.2, §9 Open Question (c)).
    #[serde(default = "default_tombstone_ttl_days")]
    pub tombstone_ttl_days: i64,
    /// Clock-skew grace added on top of the TTL.
    #[serde(default = "default_clock_skew_grace_hours")]
    pub tombstone_clock_skew_grace_hours: i64,
    /// How long a molecule can sit with no child activity before
    /// `mol_stale` reports it (§9 gate/molecule resolution).
    #[serde(default = "default_molecule_stale_days")]
    pub molecule_stale_days: i64,
    /// Minimum age, in days since `closed_at`, before an issue is eligible
    /// for compaction (§4.1's `check_eligibility`).
    #[serde(default = "default_compaction_min_age_days")]
    pub compaction_min_age_days: i64,
}

fn default_prefix() -> String {
    "bd".to_string()
}
fn default_tombstone_ttl_days() -> i64 {
    90
}
fn default_clock_skew_grace_hours() -> i64 {
    24
}
fn default_molecule_stale_days() -> i64 {
    14
}
fn default_compaction_min_age_days() -> i64 {
    30
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        WorkspaceConfig {
            prefix: default_prefix(),
            tombstone_ttl_days: default_tombstone_ttl_days(),
            tombstone_clock_skew_grace_hours: default_clock_skew_grace_hours(),
            molecule_stale_days: default_molecule_stale_days(),
            compaction_min_age_days: default_compaction_min_age_days(),
        }
    }
}

impl WorkspaceConfig {
    /// Loads `<beads_dir>/config.toml` if present, else the default, then
    /// overlays any `BD_*` environment variables that are set.
    pub fn load(beads_dir: &Path) -> Result<Self> {
        let path = beads_dir.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content).map_err(|e| Error::InvalidInput(format!("invalid config.toml: {e}")))?
        } else {
            WorkspaceConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BD_PREFIX") {
            if !v.is_empty() {
                self.prefix = v;
            }
        }
        if let Some(v) = env_i64("BD_TOMBSTONE_TTL_DAYS") {
            self.tombstone_ttl_days = v;
        }
        if let Some(v) = env_i64("BD_TOMBSTONE_CLOCK_SKEW_GRACE_HOURS") {
            self.tombstone_clock_skew_grace_hours = v;
        }
        if let Some(v) = env_i64("BD_MOLECULE_STALE_DAYS") {
            self.molecule_stale_days = v;
        }
        if let Some(v) = env_i64("BD_COMPACTION_MIN_AGE_DAYS") {
            self.compaction_min_age_days = v;
        }
    }

    pub fn save(&self, beads_dir: &Path) -> Result<()> {
        fs::create_dir_all(beads_dir)?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize config: {e}")))?;
        fs::write(beads_dir.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }

    pub fn tombstone_ttl(&self) -> Duration {
        Duration::days(self.tombstone_ttl_days)
    }

    pub fn clock_skew_grace(&self) -> Duration {
        Duration::hours(self.tombstone_clock_skew_grace_hours)
    }
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
