// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-import (§4.4 step 5, §9): before dispatching any operation other
//! than those in [`wk_ipc::operation::SKIPS_AUTO_IMPORT`], the server checks
//! whether the workspace's text file has changed on disk since it was last
//! ingested and, if so, imports it before continuing. A single-flight guard
//! keeps concurrent requests from racing the same import; a failure is
//! logged and never fails the caller's own request.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use wk_core::{import, Store};

use crate::mutation::MutationBus;

const LAST_MTIME_KEY: &str = "auto_import_last_mtime_ms";
const LAST_SIZE_KEY: &str = "auto_import_last_size";

/// A 5 second soft budget: an import that runs long still completes (the
/// store has no cancellation point mid-transaction), but a warning is
/// logged so a pathological text file shows up in the daemon log.
const SOFT_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-wide single-flight guard: only one thread imports at a time.
pub struct AutoImportGate {
    in_progress: AtomicBool,
}

impl AutoImportGate {
    pub fn new() -> Self {
        AutoImportGate {
            in_progress: AtomicBool::new(false),
        }
    }

    /// Imports `text_path` into `store` if it looks newer than the last
    /// import this workspace recorded, under the single-flight guard.
    /// Never returns an error to the caller: failures are logged and
    /// swallowed, since auto-import is a convenience, not a contract.
    pub fn maybe_import(&self, store: &mut Store, text_path: &Path, prefix: &str, mutations: &MutationBus) {
        let Ok(metadata) = std::fs::metadata(text_path) else {
            return;
        };
        let size = metadata.len();
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let last_size: Option<u64> = store
            .get_config(LAST_SIZE_KEY)
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok());
        let last_mtime: Option<i64> = store
            .get_config(LAST_MTIME_KEY)
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok());

        if last_size == Some(size) && last_mtime == Some(mtime_ms) {
            return;
        }

        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Another thread is already importing; this request proceeds
            // against whatever state exists, consistent with "best effort".
            return;
        }
        let _guard = scopeguard(&self.in_progress);

        let started = Instant::now();
        match run_import(store, text_path, prefix, mutations) {
            Ok(()) => {
                let _ = store.set_config(LAST_SIZE_KEY, &size.to_string());
                let _ = store.set_config(LAST_MTIME_KEY, &mtime_ms.to_string());
            }
            Err(e) => {
                tracing::warn!("auto-import of {} failed: {e}", text_path.display());
            }
        }
        if started.elapsed() > SOFT_TIMEOUT {
            tracing::warn!(
                "auto-import of {} took {:?}, over the {:?} soft budget",
                text_path.display(),
                started.elapsed(),
                SOFT_TIMEOUT
            );
        }
    }
}

impl Default for AutoImportGate {
    fn default() -> Self {
        Self::new()
    }
}

fn run_import(store: &mut Store, text_path: &Path, prefix: &str, mutations: &MutationBus) -> wk_core::Result<()> {
    let records: Vec<wk_core::export::ExportRecord> = wk_core::jsonl::read_all(text_path)?;
    let incoming: Vec<wk_core::Issue> = records.into_iter().map(|r| r.issue).collect();
    if incoming.is_empty() {
        return Ok(());
    }
    let opts = import::ImportOptions {
        rename_prefix: Some(prefix.to_string()),
        snapshot_protection: Default::default(),
    };
    let report = import::import(store, incoming, &opts, "auto-import")?;
    for id in report.created.iter().chain(report.updated.iter()) {
        mutations.emit(wk_core::MutationEvent {
            kind: wk_core::MutationKind::Update,
            issue_id: id.clone(),
            title: String::new(),
            assignee: None,
            actor: "auto-import".to_string(),
            timestamp: chrono::Utc::now(),
            old_status: None,
            new_status: None,
            parent_id: None,
            step_count: None,
        });
    }
    if !report.id_mapping.is_empty() {
        let _ = wk_core::export::export(store, text_path, wk_core::export::ExportPolicy::AllowPartial);
    }
    Ok(())
}

/// Clears the single-flight flag when the import attempt (successful or
/// not) finishes, even on an early return.
fn scopeguard(flag: &AtomicBool) -> impl Drop + '_ {
    struct Guard<'a>(&'a AtomicBool);
    impl Drop for Guard<'_> {
        fn drop(&mut self) {
            self.0.store(false, Ordering::SeqCst);
        }
    }
    Guard(flag)
}

#[cfg(test)]
#[path = "autoimport_tests.rs"]
mod tests;
