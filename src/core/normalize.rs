//! Usage normalization.
//!
//! Converts the permissively-structured API payload into the canonical
//! window model: a summary `usage` object plus a `limits` array, each row
//! carrying some combination of used/limit/remaining, an optional window
//! length, and an optional absolute or relative reset time. Field names
//! vary between payload generations, so every logical field is scavenged
//! through candidate keys. Rows that yield no usable used value are
//! discarded; zero usable rows means the caller falls back to local
//! estimation.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use crate::core::config;
use crate::core::models::{
    CreditEvent, CreditsDocument, UsageDocument, UsageIdentity, UsageSource, UsageWindow,
};
use crate::util::scavenge::{first_f64, first_str, first_timestamp};
use crate::util::time::{describe_reset, next_window_boundary, round_percent};

/// Default window for the shortest row that carries no explicit length.
const DEFAULT_SHORT_WINDOW_MINUTES: i64 = 300;

/// Default window for subsequent rows without an explicit length.
const DEFAULT_LONG_WINDOW_MINUTES: i64 = 10_080;

/// The three windows retained from a normalized source, smallest first.
#[derive(Debug, Clone, Default)]
pub struct NormalizedWindows {
    pub primary: Option<UsageWindow>,
    pub secondary: Option<UsageWindow>,
    pub tertiary: Option<UsageWindow>,
}

#[derive(Debug, Clone, PartialEq)]
struct ParsedRow {
    label: String,
    used: f64,
    limit: Option<f64>,
    window_minutes: Option<i64>,
    resets_at: Option<DateTime<Utc>>,
}

impl ParsedRow {
    /// Structural identity for deduplication.
    fn dedup_key(&self) -> (String, Option<i64>, Option<u64>, u64, Option<DateTime<Utc>>) {
        (
            self.label.clone(),
            self.window_minutes,
            self.limit.map(f64::to_bits),
            self.used.to_bits(),
            self.resets_at,
        )
    }
}

/// Normalize an API payload into at most three windows.
///
/// Returns `None` when the payload yields zero usable rows, which sends the
/// cycle down the fallback path.
#[must_use]
pub fn windows_from_payload(payload: &Value, now: DateTime<Utc>) -> Option<NormalizedWindows> {
    let mut rows: Vec<ParsedRow> = Vec::new();

    if let Some(summary) = payload.get("usage").filter(|v| v.is_object()) {
        if let Some(row) = parse_row(summary, "usage", now) {
            rows.push(row);
        }
    }
    if let Some(limits) = payload.get("limits").and_then(Value::as_array) {
        for (index, limit) in limits.iter().filter(|v| v.is_object()).enumerate() {
            let label = first_str(limit, &["name", "label", "id", "title"])
                .map_or_else(|| format!("limit-{index}"), ToString::to_string);
            if let Some(row) = parse_row(limit, &label, now) {
                rows.push(row);
            }
        }
    }

    let mut seen = HashSet::new();
    rows.retain(|row| seen.insert(row.dedup_key()));

    if rows.is_empty() {
        return None;
    }

    // Rows without an explicit window length take the defaults: the first
    // such row is the short window, the rest the long one.
    let mut first_unlabeled = true;
    for row in &mut rows {
        if row.window_minutes.is_none() {
            row.window_minutes = Some(if first_unlabeled {
                DEFAULT_SHORT_WINDOW_MINUTES
            } else {
                DEFAULT_LONG_WINDOW_MINUTES
            });
            first_unlabeled = false;
        }
    }

    let mut windows: Vec<UsageWindow> = rows
        .into_iter()
        .map(|row| {
            let window_minutes = row.window_minutes.unwrap_or(DEFAULT_SHORT_WINDOW_MINUTES);
            let resets_at = row
                .resets_at
                .or_else(|| next_window_boundary(now, window_minutes));
            UsageWindow {
                used_percent: used_percent(row.used, row.limit),
                resets_at,
                reset_description: resets_at
                    .map_or_else(String::new, |at| describe_reset(now, at)),
                window_minutes,
            }
        })
        .collect();

    windows.sort_by(|a, b| {
        a.window_minutes
            .cmp(&b.window_minutes)
            .then_with(|| compare_resets(a.resets_at, b.resets_at))
    });

    let mut iter = windows.into_iter();
    Some(NormalizedWindows {
        primary: iter.next(),
        secondary: iter.next(),
        tertiary: iter.next(),
    })
}

fn compare_resets(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

fn parse_row(value: &Value, label: &str, now: DateTime<Utc>) -> Option<ParsedRow> {
    let limit = first_f64(value, &["limit", "quota", "max"]).filter(|l| l.is_finite());
    let remaining = first_f64(value, &["remaining", "left"]).filter(|r| r.is_finite());

    let used = first_f64(value, &["used", "consumed", "current"])
        .filter(|u| u.is_finite())
        .or_else(|| match (limit, remaining) {
            (Some(l), Some(r)) => Some((l - r).max(0.0)),
            _ => None,
        })?;
    if used < 0.0 {
        return None;
    }

    Some(ParsedRow {
        label: label.to_string(),
        used,
        limit,
        window_minutes: window_minutes(value),
        resets_at: resets_at(value, now),
    })
}

fn window_minutes(value: &Value) -> Option<i64> {
    if let Some(minutes) =
        first_f64(value, &["windowMinutes", "window_minutes"]).filter(|m| *m > 0.0)
    {
        return Some(minutes.round() as i64);
    }

    let duration = first_f64(value, &["duration"]).filter(|d| *d > 0.0)?;
    let unit = first_str(value, &["timeUnit", "time_unit", "unit"])?;
    let minutes = match unit.to_ascii_lowercase().as_str() {
        "second" | "seconds" | "sec" | "s" => duration / 60.0,
        "minute" | "minutes" | "min" | "m" => duration,
        "hour" | "hours" | "h" => duration * 60.0,
        "day" | "days" | "d" => duration * 1440.0,
        "week" | "weeks" | "w" => duration * 10_080.0,
        _ => return None,
    };
    let rounded = minutes.round() as i64;
    (rounded > 0).then_some(rounded.max(1))
}

fn resets_at(value: &Value, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(at) = first_timestamp(value, &["resetsAt", "resets_at", "resetAt", "reset_at"]) {
        return Some(at);
    }
    let seconds =
        first_f64(value, &["reset_in", "resetIn", "resets_in"]).filter(|s| s.is_finite() && *s >= 0.0)?;
    now.checked_add_signed(TimeDelta::seconds(seconds.round() as i64))
}

/// `clamp(100 * used / limit, 0, 100)`, one decimal; a missing or zero
/// limit with nonzero usage reads as fully consumed.
#[must_use]
pub fn used_percent(used: f64, limit: Option<f64>) -> f64 {
    let percent = match limit {
        Some(limit) if limit > 0.0 => 100.0 * used / limit,
        _ if used > 0.0 => 100.0,
        _ => 0.0,
    };
    round_percent(percent.clamp(0.0, 100.0))
}

/// Extract the credits snapshot from an API payload.
///
/// Works for both a `credits` object (remaining plus an event list) and a
/// bare top-level balance number. Events missing a timestamp or delta are
/// dropped; the list keeps insertion order and is capped oldest-first.
#[must_use]
pub fn credits_from_payload(payload: &Value, now: DateTime<Utc>) -> CreditsDocument {
    let mut document = CreditsDocument::empty(now);

    let credits = payload.get("credits");
    document.remaining = match credits {
        Some(Value::Number(n)) => n.as_f64(),
        Some(obj) if obj.is_object() => first_f64(obj, &["remaining", "balance"]),
        _ => first_f64(payload, &["balance", "creditsRemaining", "credits_remaining"]),
    };

    if let Some(events) = credits
        .and_then(|c| c.get("events"))
        .and_then(Value::as_array)
    {
        for event in events {
            let Some(ts) = first_timestamp(event, &["ts", "timestamp", "at"]) else {
                continue;
            };
            let Some(delta) = first_f64(event, &["delta", "amount", "change"]) else {
                continue;
            };
            document.events.push(CreditEvent {
                ts,
                delta,
                note: first_str(event, &["note", "reason", "description"])
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }

    document.cap_events();
    document
}

/// Assemble the usage document from normalized windows and provenance.
#[must_use]
pub fn build_usage_document(
    windows: NormalizedWindows,
    source: UsageSource,
    note: Option<String>,
    now: DateTime<Utc>,
) -> UsageDocument {
    UsageDocument {
        identity: UsageIdentity {
            provider_id: config::PROVIDER_ID.to_string(),
            login_method: config::LOGIN_METHOD.to_string(),
        },
        login_method: config::LOGIN_METHOD.to_string(),
        updated_at: now,
        primary: windows.primary,
        secondary: windows.secondary,
        tertiary: windows.tertiary,
        source,
        note,
    }
}
