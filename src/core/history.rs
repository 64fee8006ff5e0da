//! History builder.
//!
//! Projects the run list into timeline entries with a derived activity
//! score: the better of a fixed per-status base and a token-volume score,
//! clamped to [1, 100]. The builder only proposes entries; merging with
//! previously persisted history is the writer's job.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};

use crate::core::config::{Config, PROVIDER_ID};
use crate::core::models::{HistoryEntry, RunRecord, RunStatus};
use crate::util::text::truncate_chars;

/// Command prefix length kept in history entries.
const HISTORY_COMMAND_MAX: usize = 50;

/// Account label attached to entries; the gateway is single-account.
const ACCOUNT: &str = "default";

/// Build history entries from a newest-first run list.
///
/// Runs outside the lookback window or without any timestamp are skipped;
/// duplicates by run id keep the first (newest) occurrence; the result is
/// capped at the configured limit.
#[must_use]
pub fn build_history(runs: &[RunRecord], config: &Config, now: DateTime<Utc>) -> Vec<HistoryEntry> {
    let cutoff = now - TimeDelta::days(config.history_lookback_days);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut entries: Vec<HistoryEntry> = Vec::new();

    for run in runs {
        if entries.len() >= config.history_limit {
            break;
        }
        let Some(ts) = entry_timestamp(run) else {
            continue;
        };
        if ts < cutoff {
            continue;
        }
        if !seen.insert(run.run_id.as_str()) {
            continue;
        }

        let activity = activity_score(run, config.tokens_per_point);
        entries.push(HistoryEntry {
            ts,
            provider: PROVIDER_ID.to_string(),
            account: ACCOUNT.to_string(),
            activity,
            session_pct: activity,
            run_id: run.run_id.clone(),
            command: truncate_chars(&run.command, HISTORY_COMMAND_MAX),
            status: run.status,
            duration: run.duration,
            workspace: run.workspace.clone(),
            input_tokens: run.token_usage.map(|u| u.input_tokens),
            output_tokens: run.token_usage.map(|u| u.output_tokens),
            cache_read_tokens: run.token_usage.map(|u| u.cache_read_tokens),
            cache_creation_tokens: run.token_usage.map(|u| u.cache_creation_tokens),
            total_tokens: run.token_usage.map(|u| u.total_tokens),
        });
    }

    entries
}

fn entry_timestamp(run: &RunRecord) -> Option<DateTime<Utc>> {
    run.created_at.or(run.started_at).or(run.finished_at)
}

/// Activity score: `max(statusBase, round(tokens / tokensPerPoint))`,
/// clamped to [1, 100].
#[must_use]
pub fn activity_score(run: &RunRecord, tokens_per_point: u64) -> u8 {
    let base = status_base_score(run.status);
    let token_score = if tokens_per_point > 0 {
        ((run.total_tokens() as f64) / (tokens_per_point as f64)).round() as u64
    } else {
        0
    };
    token_score.max(u64::from(base)).clamp(1, 100) as u8
}

const fn status_base_score(status: RunStatus) -> u8 {
    match status {
        RunStatus::Success => 4,
        RunStatus::Failed | RunStatus::TimedOut => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::core::models::TokenUsage;

    fn run(id: &str, age_minutes: i64, now: DateTime<Utc>) -> RunRecord {
        RunRecord {
            run_id: id.to_string(),
            created_at: Some(now - TimeDelta::minutes(age_minutes)),
            started_at: None,
            finished_at: None,
            status: RunStatus::Success,
            command: "kimi run build".to_string(),
            workspace: Some("ws-1".to_string()),
            exit_code: Some(0),
            duration: Some(12),
            token_usage: None,
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn dedup_keeps_first_newest_occurrence() {
        let now = fixed_now();
        let mut newer = run("run-1", 5, now);
        newer.command = "newer".to_string();
        let mut older = run("run-1", 500, now);
        older.command = "older".to_string();

        let entries = build_history(&[newer, older], &Config::default(), now);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].command, "newer");
    }

    #[test]
    fn lookback_excludes_old_and_undated_runs() {
        let now = fixed_now();
        let mut undated = run("run-undated", 0, now);
        undated.created_at = None;
        let ancient = run("run-ancient", 60 * 24 * 45, now);
        let recent = run("run-recent", 10, now);

        let entries = build_history(&[recent, ancient, undated], &Config::default(), now);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].run_id, "run-recent");
    }

    #[test]
    fn cap_keeps_newest_entries() {
        let now = fixed_now();
        let runs: Vec<RunRecord> = (0..10).map(|i| run(&format!("run-{i}"), i, now)).collect();
        let config = Config {
            history_limit: 3,
            ..Config::default()
        };

        let entries = build_history(&runs, &config, now);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].run_id, "run-0");
        assert_eq!(entries[2].run_id, "run-2");
    }

    #[test]
    fn activity_score_from_status_base() {
        let now = fixed_now();
        let mut r = run("run-1", 0, now);
        assert_eq!(activity_score(&r, 1000), 4);
        r.status = RunStatus::TimedOut;
        assert_eq!(activity_score(&r, 1000), 2);
        r.status = RunStatus::Canceled;
        assert_eq!(activity_score(&r, 1000), 1);
        r.status = RunStatus::Unknown;
        assert_eq!(activity_score(&r, 1000), 1);
    }

    #[test]
    fn activity_score_from_tokens_clamped() {
        let now = fixed_now();
        let mut r = run("run-1", 0, now);
        r.token_usage = Some(TokenUsage::from_parts(12_000, 0, 0, 0));
        assert_eq!(activity_score(&r, 1000), 12);
        r.token_usage = Some(TokenUsage::from_parts(900_000, 0, 0, 0));
        assert_eq!(activity_score(&r, 1000), 100);
    }

    #[test]
    fn command_is_truncated_and_session_pct_mirrors_activity() {
        let now = fixed_now();
        let mut r = run("run-1", 0, now);
        r.command = "x".repeat(120);
        let entries = build_history(&[r], &Config::default(), now);
        assert_eq!(entries[0].command.chars().count(), 50);
        assert_eq!(entries[0].session_pct, entries[0].activity);
    }
}
