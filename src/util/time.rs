//! Time-window math and reset formatting.

use chrono::{DateTime, TimeDelta, Utc};

/// Canonical window sizes in minutes, smallest first.
pub const CANONICAL_WINDOWS_MINUTES: &[i64] = &[5, 60, 300, 1440, 10_080];

/// Next boundary of a fixed-size rolling window anchored at the Unix epoch.
///
/// Windows of `window_minutes` tile the timeline starting at epoch; the
/// result is the earliest boundary strictly after `now`.
#[must_use]
pub fn next_window_boundary(now: DateTime<Utc>, window_minutes: i64) -> Option<DateTime<Utc>> {
    if window_minutes <= 0 {
        return None;
    }
    let window_secs = window_minutes.checked_mul(60)?;
    let now_secs = now.timestamp();
    let elapsed = now_secs.rem_euclid(window_secs);
    let next = now_secs - elapsed + window_secs;
    DateTime::from_timestamp(next, 0)
}

/// Human description of a window length ("5m", "1h", "5h", "1d", "1w").
#[must_use]
pub fn describe_window(window_minutes: i64) -> String {
    match window_minutes {
        m if m >= 10_080 && m % 10_080 == 0 => format!("{}w", m / 10_080),
        m if m >= 1440 && m % 1440 == 0 => format!("{}d", m / 1440),
        m if m >= 60 && m % 60 == 0 => format!("{}h", m / 60),
        m => format!("{m}m"),
    }
}

/// Whether a timestamp falls within the trailing window ending at `now`.
#[must_use]
pub fn within_trailing_window(
    ts: DateTime<Utc>,
    now: DateTime<Utc>,
    window_minutes: i64,
) -> bool {
    let age = now.signed_duration_since(ts);
    age >= TimeDelta::zero() && age < TimeDelta::minutes(window_minutes)
}

/// Human description of time remaining until a reset.
///
/// Deterministic given a fixed `now`; minutes are rounded up so a reset is
/// never described as closer than it is.
#[must_use]
pub fn describe_reset(now: DateTime<Utc>, resets_at: DateTime<Utc>) -> String {
    let delta = resets_at.signed_duration_since(now);
    if delta <= TimeDelta::zero() {
        return "resets now".to_string();
    }
    let total_minutes = ((delta.num_seconds() + 59) / 60).max(1);
    let days = total_minutes / 1440;
    let hours = (total_minutes % 1440) / 60;
    let minutes = total_minutes % 60;
    if days > 0 {
        format!("resets in {days}d {hours}h")
    } else if hours > 0 {
        format!("resets in {hours}h {minutes}m")
    } else {
        format!("resets in {minutes}m")
    }
}

/// Round a percentage to one decimal place.
#[must_use]
pub fn round_percent(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn boundary_is_strictly_after_now() {
        let now = Utc.with_ymd_and_hms(2026, 1, 18, 12, 3, 17).unwrap();
        let next = next_window_boundary(now, 5).unwrap();
        assert!(next > now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 18, 12, 5, 0).unwrap());
    }

    #[test]
    fn boundary_on_exact_edge_advances_full_window() {
        let now = Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap();
        let next = next_window_boundary(now, 60).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 18, 13, 0, 0).unwrap());
    }

    #[test]
    fn boundary_rejects_nonpositive_window() {
        assert!(next_window_boundary(Utc::now(), 0).is_none());
        assert!(next_window_boundary(Utc::now(), -5).is_none());
    }

    #[test]
    fn window_descriptions() {
        assert_eq!(describe_window(5), "5m");
        assert_eq!(describe_window(60), "1h");
        assert_eq!(describe_window(300), "5h");
        assert_eq!(describe_window(1440), "1d");
        assert_eq!(describe_window(10_080), "1w");
        assert_eq!(describe_window(90), "90m");
    }

    #[test]
    fn trailing_window_membership() {
        let now = Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap();
        let inside = now - TimeDelta::minutes(299);
        let outside = now - TimeDelta::minutes(301);
        let future = now + TimeDelta::minutes(1);
        assert!(within_trailing_window(inside, now, 300));
        assert!(!within_trailing_window(outside, now, 300));
        assert!(!within_trailing_window(future, now, 300));
    }

    #[test]
    fn reset_descriptions() {
        let now = Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap();
        assert_eq!(
            describe_reset(now, now + TimeDelta::minutes(14)),
            "resets in 14m"
        );
        assert_eq!(
            describe_reset(now, now + TimeDelta::minutes(134)),
            "resets in 2h 14m"
        );
        assert_eq!(
            describe_reset(now, now + TimeDelta::minutes(3000)),
            "resets in 2d 2h"
        );
        assert_eq!(describe_reset(now, now - TimeDelta::minutes(1)), "resets now");
        // 30 seconds rounds up to a minute.
        assert_eq!(
            describe_reset(now, now + TimeDelta::seconds(30)),
            "resets in 1m"
        );
    }

    #[test]
    fn percent_rounding_one_decimal() {
        assert!((round_percent(29.97) - 30.0).abs() < f64::EPSILON);
        assert!((round_percent(7.04) - 7.0).abs() < f64::EPSILON);
        assert!((round_percent(0.05) - 0.1).abs() < f64::EPSILON);
    }
}
