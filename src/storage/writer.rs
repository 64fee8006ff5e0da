//! Persistence writer.
//!
//! Serializes documents to one or more destination directories using the
//! temp-file-then-rename pattern so concurrent readers (the dashboard's web
//! server) never observe a partially written file. Also owns the
//! history merge-on-write: freshly proposed history entries are unioned
//! with whatever survives on disk, so history stays additive across cycles
//! even after the record store rotates old runs out.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::core::models::HistoryEntry;
use crate::error::{CollectorError, Result};

/// Result of writing one document to all configured destinations.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Paths successfully written.
    pub written: Vec<PathBuf>,
    /// Per-destination failures (path, reason).
    pub failures: Vec<(PathBuf, String)>,
}

impl WriteOutcome {
    /// Whether at least one destination was written.
    #[must_use]
    pub fn any_succeeded(&self) -> bool {
        !self.written.is_empty()
    }
}

/// Write a document to every destination directory under `file_name`.
///
/// All destinations are attempted; per-destination failures are collected
/// and logged rather than short-circuiting.
///
/// # Errors
/// Returns `AllDestinationsFailed` only when no destination could be
/// written.
pub fn write_to_destinations<T: Serialize>(
    dirs: &[PathBuf],
    file_name: &str,
    data: &T,
) -> Result<WriteOutcome> {
    let content = serde_json::to_string_pretty(data).map_err(CollectorError::Json)?;

    let mut outcome = WriteOutcome::default();
    for dir in dirs {
        let target = dir.join(file_name);
        match write_atomic(&target, content.as_bytes()) {
            Ok(()) => {
                tracing::debug!(path = %target.display(), "document written");
                outcome.written.push(target);
            }
            Err(e) => {
                tracing::warn!(path = %target.display(), error = %e, "document write failed");
                outcome.failures.push((target, e.to_string()));
            }
        }
    }

    finish(outcome, file_name)
}

fn finish(outcome: WriteOutcome, file_name: &str) -> Result<WriteOutcome> {
    if outcome.any_succeeded() {
        Ok(outcome)
    } else {
        let details = outcome
            .failures
            .iter()
            .map(|(path, reason)| format!("{}: {reason}", path.display()))
            .collect::<Vec<_>>()
            .join("; ");
        Err(CollectorError::AllDestinationsFailed {
            document: file_name.to_string(),
            details,
        })
    }
}

/// Write bytes atomically: temp file in the same directory, fsync, rename.
///
/// Creates missing parent directories.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;

    // Temp file must live in the same directory for the rename to be atomic.
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("doc"),
        std::process::id()
    ));

    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// Merge proposed history into each destination's existing file and write
/// the result.
///
/// Destinations are merged independently so one directory's stale or
/// corrupt history never bleeds into another's.
///
/// # Errors
/// Returns `AllDestinationsFailed` only when no destination could be
/// written.
pub fn write_history(
    dirs: &[PathBuf],
    file_name: &str,
    proposed: &[HistoryEntry],
    limit: usize,
) -> Result<WriteOutcome> {
    let mut outcome = WriteOutcome::default();
    for dir in dirs {
        let target = dir.join(file_name);
        let merged = merge_history(read_history(&target), proposed.to_vec(), limit);
        let result = serde_json::to_string_pretty(&merged)
            .map_err(std::io::Error::other)
            .and_then(|content| write_atomic(&target, content.as_bytes()));
        match result {
            Ok(()) => {
                tracing::debug!(path = %target.display(), entries = merged.len(), "history written");
                outcome.written.push(target);
            }
            Err(e) => {
                tracing::warn!(path = %target.display(), error = %e, "history write failed");
                outcome.failures.push((target, e.to_string()));
            }
        }
    }

    finish(outcome, file_name)
}

/// Read previously persisted history from disk.
///
/// Missing file, unreadable content, non-array JSON, and individually
/// malformed entries all degrade to "absent" rather than failing the cycle.
#[must_use]
pub fn read_history(path: &Path) -> Vec<HistoryEntry> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let Ok(value) = serde_json::from_str::<Value>(&content) else {
        tracing::warn!(path = %path.display(), "history file is not valid JSON, treating as empty");
        return Vec::new();
    };
    let Value::Array(items) = value else {
        tracing::warn!(path = %path.display(), "history file is not an array, treating as empty");
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<HistoryEntry>(item).ok())
        .collect()
}

/// Merge freshly proposed history entries with previously persisted ones.
///
/// Union by `run_id` with the persisted entry winning on conflict, sorted
/// newest-first by `ts`, capped at `limit`. Persisted entries never expire
/// by age here; only the count cap bounds them.
#[must_use]
pub fn merge_history(
    persisted: Vec<HistoryEntry>,
    proposed: Vec<HistoryEntry>,
    limit: usize,
) -> Vec<HistoryEntry> {
    let existing_ids: HashSet<String> =
        persisted.iter().map(|e| e.run_id.clone()).collect();

    let mut merged: Vec<HistoryEntry> = proposed
        .into_iter()
        .filter(|e| !existing_ids.contains(&e.run_id))
        .chain(persisted)
        .collect();

    merged.sort_by(|a, b| b.ts.cmp(&a.ts));
    merged.truncate(limit);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};
    use tempfile::TempDir;

    use crate::core::models::RunStatus;

    fn entry(run_id: &str, age_minutes: i64) -> HistoryEntry {
        HistoryEntry {
            ts: Utc::now() - TimeDelta::minutes(age_minutes),
            provider: "kimi".to_string(),
            account: "default".to_string(),
            activity: 4,
            session_pct: 4,
            run_id: run_id.to_string(),
            command: "kimi run".to_string(),
            status: RunStatus::Success,
            duration: Some(10),
            workspace: None,
            input_tokens: None,
            output_tokens: None,
            cache_read_tokens: None,
            cache_creation_tokens: None,
            total_tokens: None,
        }
    }

    #[test]
    fn writes_to_every_destination() {
        let tmp = TempDir::new().unwrap();
        let dirs = vec![tmp.path().join("a"), tmp.path().join("b/nested")];
        let outcome =
            write_to_destinations(&dirs, "kimi-stats.json", &serde_json::json!({"ok": true}))
                .unwrap();

        assert_eq!(outcome.written.len(), 2);
        assert!(outcome.failures.is_empty());
        for dir in &dirs {
            let content = std::fs::read_to_string(dir.join("kimi-stats.json")).unwrap();
            assert!(content.contains("\"ok\": true"));
        }
    }

    #[test]
    fn partial_failure_is_collected_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good");
        // A destination whose parent is a regular file cannot be created.
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a dir").unwrap();
        let bad = blocker.join("sub");

        let dirs = vec![good.clone(), bad];
        let outcome =
            write_to_destinations(&dirs, "kimi-stats.json", &serde_json::json!({})).unwrap();

        assert_eq!(outcome.written.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert!(good.join("kimi-stats.json").exists());
    }

    #[test]
    fn all_destinations_failing_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a dir").unwrap();

        let dirs = vec![blocker.join("x"), blocker.join("y")];
        let err = write_to_destinations(&dirs, "kimi-usage.json", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(
            err,
            CollectorError::AllDestinationsFailed { .. }
        ));
    }

    #[test]
    fn rewrite_replaces_content_fully() {
        let tmp = TempDir::new().unwrap();
        let dirs = vec![tmp.path().to_path_buf()];
        write_to_destinations(&dirs, "doc.json", &serde_json::json!({"v": 1})).unwrap();
        write_to_destinations(&dirs, "doc.json", &serde_json::json!({"v": 2})).unwrap();

        let content = std::fs::read_to_string(tmp.path().join("doc.json")).unwrap();
        let parsed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["v"], 2);
        // No leftover temp files.
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn interrupted_write_leaves_old_content_intact() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("doc.json");
        let old = "{\n  \"v\": \"old\"\n}";
        std::fs::write(&target, old).unwrap();

        // Occupy the staging path with a directory so the write fails
        // after the old file exists but before any rename can happen.
        let staging = tmp
            .path()
            .join(format!(".doc.json.tmp.{}", std::process::id()));
        std::fs::create_dir(&staging).unwrap();

        assert!(write_atomic(&target, b"{\n  \"v\": \"new\"\n}").is_err());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), old);
    }

    #[test]
    fn read_history_tolerates_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kimi-history.json");

        assert!(read_history(&path).is_empty());

        std::fs::write(&path, "not json at all").unwrap();
        assert!(read_history(&path).is_empty());

        std::fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        assert!(read_history(&path).is_empty());
    }

    #[test]
    fn read_history_skips_malformed_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kimi-history.json");
        let good = serde_json::to_value(entry("run-1", 5)).unwrap();
        let array = Value::Array(vec![good, serde_json::json!({"junk": true})]);
        std::fs::write(&path, serde_json::to_string(&array).unwrap()).unwrap();

        let history = read_history(&path);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].run_id, "run-1");
    }

    #[test]
    fn write_history_merges_each_destination_independently() {
        let tmp = TempDir::new().unwrap();
        let with_past = tmp.path().join("with-past");
        let fresh = tmp.path().join("fresh");
        std::fs::create_dir_all(&with_past).unwrap();
        std::fs::write(
            with_past.join("kimi-history.json"),
            serde_json::to_string(&vec![entry("run-old", 300)]).unwrap(),
        )
        .unwrap();

        let dirs = vec![with_past.clone(), fresh.clone()];
        write_history(&dirs, "kimi-history.json", &[entry("run-new", 1)], 100).unwrap();

        let merged = read_history(&with_past.join("kimi-history.json"));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].run_id, "run-new");
        let fresh_only = read_history(&fresh.join("kimi-history.json"));
        assert_eq!(fresh_only.len(), 1);
    }

    #[test]
    fn merge_prefers_persisted_on_conflict() {
        let mut persisted = entry("run-1", 10);
        persisted.command = "persisted".to_string();
        let mut proposed = entry("run-1", 10);
        proposed.command = "proposed".to_string();

        let merged = merge_history(vec![persisted], vec![proposed], 100);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].command, "persisted");
    }

    #[test]
    fn merge_sorts_newest_first_and_caps() {
        let persisted = vec![entry("old-1", 500), entry("old-2", 400)];
        let proposed = vec![entry("new-1", 1), entry("new-2", 2)];

        let merged = merge_history(persisted, proposed, 3);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].run_id, "new-1");
        assert_eq!(merged[1].run_id, "new-2");
        assert_eq!(merged[2].run_id, "old-2");
    }
}
