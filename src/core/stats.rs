//! Aggregate statistics over the run list.

use chrono::{DateTime, Utc};

use crate::core::models::{
    GatewayStats, RecentRun, RunRecord, RunStatus, StatsDocument, StatsSummary, StatusCounts,
};
use crate::util::text::truncate_chars;
use crate::util::time::{round_percent, within_trailing_window};

/// Command prefix length kept in the `recentRuns` projection.
const RECENT_COMMAND_MAX: usize = 80;

/// Build the stats document from a newest-first run list.
#[must_use]
pub fn build_stats(runs: &[RunRecord], recent_cap: usize, now: DateTime<Utc>) -> StatsDocument {
    let mut counts = StatusCounts::default();
    for run in runs {
        counts.record(run.status);
    }

    let recent_runs = runs
        .iter()
        .take(recent_cap)
        .map(|run| RecentRun {
            run_id: run.run_id.clone(),
            created_at: run.created_at,
            status: run.status,
            command: truncate_chars(&run.command, RECENT_COMMAND_MAX),
            duration: run.duration,
            workspace: run.workspace.clone(),
            exit_code: run.exit_code,
            total_tokens: run.total_tokens(),
        })
        .collect();

    StatsDocument {
        last_updated: now,
        total_runs: counts.total(),
        status: "ready".to_string(),
        summary: StatsSummary {
            success_rate: success_rate(&counts),
            counts,
        },
        recent_runs,
    }
}

/// Rate metrics for the usage document's gateway panel.
#[must_use]
pub fn gateway_stats(runs: &[RunRecord], now: DateTime<Utc>) -> GatewayStats {
    let mut counts = StatusCounts::default();
    let mut runs_today = 0;
    let mut runs_this_week = 0;
    let mut runs_last_5_min = 0;
    let mut runs_last_hour = 0;
    let mut success_duration_sum: i64 = 0;
    let mut success_duration_count: i64 = 0;

    for run in runs {
        counts.record(run.status);
        if let Some(created) = run.created_at {
            if created.date_naive() == now.date_naive() {
                runs_today += 1;
            }
            if within_trailing_window(created, now, 10_080) {
                runs_this_week += 1;
            }
            if within_trailing_window(created, now, 60) {
                runs_last_hour += 1;
            }
            if within_trailing_window(created, now, 5) {
                runs_last_5_min += 1;
            }
        }
        if run.status == RunStatus::Success {
            if let Some(duration) = run.duration {
                success_duration_sum += duration;
                success_duration_count += 1;
            }
        }
    }

    let avg_duration = if success_duration_count > 0 {
        (success_duration_sum as f64 / success_duration_count as f64).round() as i64
    } else {
        0
    };

    GatewayStats {
        total_runs: counts.total(),
        runs_today,
        runs_this_week,
        runs_last_5_min,
        runs_last_hour,
        rpm_5_min: round_percent(f64::from(u32::try_from(runs_last_5_min).unwrap_or(u32::MAX)) / 5.0),
        rpm_hour: round_percent(f64::from(u32::try_from(runs_last_hour).unwrap_or(u32::MAX)) / 60.0),
        avg_duration,
        success_rate: success_rate(&counts),
        successful: counts.success,
        failed: counts.failed,
    }
}

fn success_rate(counts: &StatusCounts) -> f64 {
    let total = counts.total();
    if total == 0 {
        return 0.0;
    }
    round_percent(100.0 * counts.success as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    use crate::core::models::TokenUsage;

    fn run(id: &str, status: RunStatus, age_minutes: i64, now: DateTime<Utc>) -> RunRecord {
        RunRecord {
            run_id: id.to_string(),
            created_at: Some(now - TimeDelta::minutes(age_minutes)),
            started_at: None,
            finished_at: None,
            status,
            command: "kimi run build".to_string(),
            workspace: None,
            exit_code: Some(0),
            duration: Some(10),
            token_usage: Some(TokenUsage::from_parts(100, 20, 0, 0)),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn counts_and_success_rate() {
        let now = fixed_now();
        let runs = vec![
            run("run-1", RunStatus::Success, 1, now),
            run("run-2", RunStatus::Success, 2, now),
            run("run-3", RunStatus::Failed, 3, now),
        ];
        let stats = build_stats(&runs, 20, now);
        assert_eq!(stats.total_runs, 3);
        assert_eq!(stats.summary.counts.success, 2);
        assert_eq!(stats.summary.counts.failed, 1);
        assert!((stats.summary.success_rate - 66.7).abs() < f64::EPSILON);
        assert_eq!(stats.status, "ready");
    }

    #[test]
    fn empty_store_is_ready_with_zero_rate() {
        let stats = build_stats(&[], 20, fixed_now());
        assert_eq!(stats.total_runs, 0);
        assert!(stats.summary.success_rate.abs() < f64::EPSILON);
        assert_eq!(stats.status, "ready");
        assert!(stats.recent_runs.is_empty());
    }

    #[test]
    fn recent_runs_bounded_and_truncated() {
        let now = fixed_now();
        let mut runs: Vec<RunRecord> = (0..30)
            .map(|i| run(&format!("run-{i}"), RunStatus::Success, i, now))
            .collect();
        runs[0].command = "y".repeat(200);

        let stats = build_stats(&runs, 20, now);
        assert_eq!(stats.recent_runs.len(), 20);
        assert_eq!(stats.recent_runs[0].run_id, "run-0");
        assert_eq!(stats.recent_runs[0].command.chars().count(), 80);
        assert_eq!(stats.recent_runs[0].total_tokens, 120);
    }

    #[test]
    fn gateway_rate_windows() {
        let now = fixed_now();
        let runs = vec![
            run("run-now", RunStatus::Success, 1, now),
            run("run-30m", RunStatus::Success, 30, now),
            run("run-2h", RunStatus::Failed, 120, now),
            run("run-3d", RunStatus::Success, 60 * 24 * 3, now),
        ];

        let stats = gateway_stats(&runs, now);
        assert_eq!(stats.total_runs, 4);
        assert_eq!(stats.runs_last_5_min, 1);
        assert_eq!(stats.runs_last_hour, 2);
        assert_eq!(stats.runs_this_week, 4);
        assert!((stats.rpm_5_min - 0.2).abs() < f64::EPSILON);
        assert!((stats.success_rate - 75.0).abs() < f64::EPSILON);
        assert_eq!(stats.successful, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.avg_duration, 10);
    }

    #[test]
    fn runs_today_uses_calendar_day() {
        let now = fixed_now();
        let runs = vec![
            run("run-morning", RunStatus::Success, 60 * 11, now),
            run("run-yesterday", RunStatus::Success, 60 * 13, now),
        ];
        let stats = gateway_stats(&runs, now);
        assert_eq!(stats.runs_today, 1);
    }
}
