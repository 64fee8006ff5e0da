//! Local usage estimation.
//!
//! When the API path is unavailable or yields nothing usable, usage is
//! estimated from the run list: token totals of runs created within the
//! session and week windows, divided by configurable budgets. The result
//! is clearly marked `gateway-fallback` so consumers never mistake an
//! estimate for authoritative quota data.

use chrono::{DateTime, Utc};

use crate::core::config::Config;
use crate::core::models::{RunRecord, UsageWindow};
use crate::core::normalize::NormalizedWindows;
use crate::util::time::{describe_window, next_window_boundary, round_percent, within_trailing_window};

/// Estimate the session and week windows from local token sums.
#[must_use]
pub fn estimate_windows(
    runs: &[RunRecord],
    config: &Config,
    now: DateTime<Utc>,
) -> NormalizedWindows {
    NormalizedWindows {
        primary: Some(estimate_window(
            runs,
            now,
            config.session_window_minutes,
            config.session_token_budget,
        )),
        secondary: Some(estimate_window(
            runs,
            now,
            config.week_window_minutes,
            config.week_token_budget,
        )),
        tertiary: None,
    }
}

fn estimate_window(
    runs: &[RunRecord],
    now: DateTime<Utc>,
    window_minutes: i64,
    token_budget: u64,
) -> UsageWindow {
    let tokens: u64 = runs
        .iter()
        .filter(|run| {
            run.created_at
                .is_some_and(|created| within_trailing_window(created, now, window_minutes))
        })
        .map(RunRecord::total_tokens)
        .sum();

    let percent = if token_budget > 0 {
        (100.0 * tokens as f64 / token_budget as f64).clamp(0.0, 100.0)
    } else {
        0.0
    };

    UsageWindow {
        used_percent: round_percent(percent),
        resets_at: next_window_boundary(now, window_minutes),
        reset_description: format!("~{tokens} tokens in last {}", describe_window(window_minutes)),
        window_minutes,
    }
}
