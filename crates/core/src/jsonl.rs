// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL (JSON Lines) file utilities.
//!
//! Provides durable storage for JSON-serializable records, one per line,
//! matching the text-file wire format: append for single-record durability,
//! and an atomic temp-file + rename for bulk writes such as export.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Appends a record to a JSONL file with fsync for durability.
pub fn append<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let json = serde_json::to_string(record)?;
    writeln!(file, "{json}")?;
    file.sync_all()?;

    Ok(())
}

/// Reads all records from a JSONL file.
///
/// Skips empty lines and returns an empty vec if the file doesn't exist.
/// A line that fails to deserialize (a corrupt record, an unparseable
/// timestamp, a hand-edited line with a typo) is logged and skipped rather
/// than aborting the read, so one bad line doesn't take every other issue
/// in the file down with it.
pub fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = lineno + 1, error = %e, "skipping unparseable record");
            }
        }
    }

    Ok(records)
}

/// Reads all non-empty raw lines from a JSONL file, without deserializing.
/// Used by the merge driver, which needs to preserve trailing conflict
/// marker blocks that aren't valid JSON records.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Writes all records to a JSONL file, replacing existing content in place
/// (not atomic; used for small scratch files where a rename isn't needed).
pub fn write_all<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut file = File::create(path)?;

    for record in records {
        let json = serde_json::to_string(record)?;
        writeln!(file, "{json}")?;
    }
    file.sync_all()?;

    Ok(())
}

/// Writes all records to `path` atomically: serialize to a sibling
/// `<path>.tmp` file in the same directory, fsync, rename over the target,
/// then restrict permissions to 0600 (export's on-disk contract, §6).
pub fn write_all_atomic<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = sibling_temp_path(path);

    {
        let temp_file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(temp_file);
        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{json}")?;
        }
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    }

    std::fs::rename(&temp_path, path)?;
    set_owner_only_permissions(path)?;
    Ok(())
}

fn sibling_temp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
