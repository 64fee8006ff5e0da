//! Shared helpers for unit and integration tests.
//!
//! Available to integration tests through the `test-utils` feature.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::core::models::{RunRecord, RunStatus, TokenUsage};

/// Fixed clock used across deterministic tests.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap()
}

/// Fresh temporary directory for state or output.
///
/// # Panics
/// Panics when the directory cannot be created.
#[must_use]
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().expect("create temp dir")
}

/// A plausible successful run record.
#[must_use]
pub fn sample_run(run_id: &str, created_at: DateTime<Utc>) -> RunRecord {
    RunRecord {
        run_id: run_id.to_string(),
        created_at: Some(created_at),
        started_at: Some(created_at),
        finished_at: Some(created_at + chrono::TimeDelta::seconds(30)),
        status: RunStatus::Success,
        command: "kimi run build".to_string(),
        workspace: Some("ws-main".to_string()),
        exit_code: Some(0),
        duration: Some(30),
        token_usage: None,
    }
}

/// A run record carrying token usage built from the given components.
#[must_use]
pub fn run_with_tokens(
    run_id: &str,
    created_at: DateTime<Utc>,
    input: u64,
    output: u64,
) -> RunRecord {
    RunRecord {
        token_usage: Some(TokenUsage::from_parts(input, output, 0, 0)),
        ..sample_run(run_id, created_at)
    }
}

/// Write a `record.json` under `<state>/runs/<name>/`.
///
/// # Panics
/// Panics on I/O failure; test setup only.
pub fn write_run_record(state_dir: &Path, name: &str, record: &Value) {
    let dir = state_dir.join("runs").join(name);
    std::fs::create_dir_all(&dir).expect("create run dir");
    std::fs::write(
        dir.join("record.json"),
        serde_json::to_string_pretty(record).expect("serialize record"),
    )
    .expect("write record");
}

/// Write a combined log next to a run's record.
///
/// # Panics
/// Panics on I/O failure; test setup only.
pub fn write_combined_log(state_dir: &Path, name: &str, content: &str) {
    let dir = state_dir.join("runs").join(name);
    std::fs::create_dir_all(&dir).expect("create run dir");
    std::fs::write(dir.join("combined.log"), content).expect("write combined log");
}

/// Assert two floats are equal within a small tolerance.
#[macro_export]
macro_rules! assert_float_eq {
    ($left:expr, $right:expr) => {
        let (left, right) = ($left, $right);
        assert!(
            (left - right).abs() < 1e-9,
            "expected {right}, got {left}"
        );
    };
}

/// Assert a string contains a substring, with a readable failure message.
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let (haystack, needle) = (&$haystack, &$needle);
        assert!(
            haystack.contains(&**needle),
            "expected {haystack:?} to contain {needle:?}"
        );
    };
}
