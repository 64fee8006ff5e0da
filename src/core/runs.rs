//! Run-record store reader.
//!
//! The gateway persists one directory per execution under
//! `<state>/runs/run-<id>/`, each holding a `record.json` plus log files.
//! Two schema generations coexist in the store (camelCase and snake_case,
//! RFC 3339 and epoch timestamps), so records are scavenged field-by-field
//! through ordered candidate keys rather than parsed strictly. A record that
//! cannot be read at all is skipped with a warning; one bad run never fails
//! the cycle.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::core::models::{RunRecord, RunStatus, TokenUsage};
use crate::core::run_logs;
use crate::util::scavenge::{first_i64, first_str, first_timestamp};

const RUN_DIR_PREFIX: &str = "run-";
const RECORD_FILE: &str = "record.json";
const COMBINED_LOG_FILE: &str = "combined.log";

const CREATED_KEYS: &[&str] = &["createdAt", "created_at", "queuedAt", "queued_at"];
const STARTED_KEYS: &[&str] = &["startedAt", "started_at", "startTime"];
const FINISHED_KEYS: &[&str] = &[
    "finishedAt",
    "finished_at",
    "completedAt",
    "completed_at",
    "endTime",
];
const COMMAND_KEYS: &[&str] = &["command", "requestedCommand", "cmd", "prompt"];
const WORKSPACE_KEYS: &[&str] = &["workspace", "cwd", "workingDirectory", "working_dir"];
const USAGE_CONTAINER_KEYS: &[&str] = &["tokenUsage", "token_usage", "usage", "tokens"];

/// Load all run records from the state directory, newest first.
///
/// Records missing token counts are backfilled from their combined log when
/// one exists. Runs without any usable timestamp sort last.
#[must_use]
pub fn load_runs(state_dir: &Path) -> Vec<RunRecord> {
    let runs_dir = state_dir.join("runs");
    let Ok(entries) = std::fs::read_dir(&runs_dir) else {
        tracing::debug!(dir = %runs_dir.display(), "runs directory not readable, treating store as empty");
        return Vec::new();
    };

    let mut runs: Vec<RunRecord> = Vec::new();
    for entry in entries.filter_map(std::result::Result::ok) {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_dir() || !name.starts_with(RUN_DIR_PREFIX) {
            continue;
        }
        match load_record(&path, name) {
            Some(record) => runs.push(record),
            None => {
                tracing::warn!(run = name, "skipping unreadable run record");
            }
        }
    }

    runs.sort_by(|a, b| compare_newest_first(sort_key(a), sort_key(b)));
    runs
}

fn load_record(run_dir: &Path, dir_name: &str) -> Option<RunRecord> {
    let content = std::fs::read_to_string(run_dir.join(RECORD_FILE)).ok()?;
    let value: Value = serde_json::from_str(&content).ok()?;
    if !value.is_object() {
        return None;
    }

    let run_id = first_str(&value, &["runId", "run_id", "id"])
        .map_or_else(|| dir_name.to_string(), ToString::to_string);

    let started_at = first_timestamp(&value, STARTED_KEYS);
    let finished_at = first_timestamp(&value, FINISHED_KEYS);

    let mut record = RunRecord {
        run_id,
        created_at: first_timestamp(&value, CREATED_KEYS),
        started_at,
        finished_at,
        status: first_str(&value, &["status", "state"]).map_or(RunStatus::Unknown, RunStatus::parse),
        command: first_str(&value, COMMAND_KEYS).unwrap_or_default().to_string(),
        workspace: first_str(&value, WORKSPACE_KEYS).map(ToString::to_string),
        exit_code: first_i64(&value, &["exitCode", "exit_code"]),
        duration: derive_duration(&value, started_at, finished_at),
        token_usage: scavenge_token_usage(&value),
    };

    if record.token_usage.is_none_or(|u| u.is_empty()) {
        record.token_usage = run_logs::extract_from_log_file(&combined_log_path(&value, run_dir));
    }

    Some(record)
}

/// Duration in seconds. An explicit duration field wins; otherwise derived
/// from the start/finish pair, and `None` when the pair is absent or
/// inverted.
fn derive_duration(
    value: &Value,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
) -> Option<i64> {
    if let Some(explicit) = first_i64(value, &["durationSeconds", "duration_seconds"]) {
        return (explicit >= 0).then_some(explicit);
    }
    if let Some(ms) = first_i64(value, &["durationMs", "duration_ms"]) {
        return (ms >= 0).then_some(ms / 1000);
    }

    let (started, finished) = (started_at?, finished_at?);
    let secs = finished.signed_duration_since(started).num_seconds();
    (secs >= 0).then_some(secs)
}

fn scavenge_token_usage(value: &Value) -> Option<TokenUsage> {
    let container = USAGE_CONTAINER_KEYS
        .iter()
        .find_map(|key| value.get(*key))
        .filter(|v| v.is_object())?;

    let component = |keys: &[&str]| {
        first_i64(container, keys)
            .filter(|n| *n >= 0)
            .map_or(0, |n| n as u64)
    };

    let usage = TokenUsage::from_parts(
        component(&["inputTokens", "input_tokens", "input"]),
        component(&["outputTokens", "output_tokens", "output"]),
        component(&["cacheReadTokens", "cache_read_input_tokens", "cache_read"]),
        component(&[
            "cacheCreationTokens",
            "cache_creation_input_tokens",
            "cache_creation",
        ]),
    );
    (!usage.is_empty()).then_some(usage)
}

fn combined_log_path(value: &Value, run_dir: &Path) -> PathBuf {
    value
        .get("logs")
        .and_then(|logs| logs.get("combinedPath"))
        .and_then(Value::as_str)
        .map_or_else(
            || run_dir.join(COMBINED_LOG_FILE),
            |p| {
                let path = Path::new(p);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    run_dir.join(path)
                }
            },
        )
}

fn sort_key(record: &RunRecord) -> Option<DateTime<Utc>> {
    record
        .created_at
        .or(record.started_at)
        .or(record.finished_at)
}

fn compare_newest_first(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}
