//! Canonical data models for the collector.
//!
//! Everything heterogeneous (two generations of run-record schema, the
//! permissive usage API payload) is normalized into these types at the
//! parsing boundary; nothing downstream sees raw JSON. Wire output is
//! camelCase to match the documents the dashboard already consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum credit events retained in a `CreditsDocument`.
pub const CREDIT_EVENTS_CAP: usize = 200;

// =============================================================================
// Run Records
// =============================================================================

/// Terminal and in-flight states a gateway run can report.
///
/// Unrecognized status strings fold into `Unknown` rather than failing the
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
    Running,
    Queued,
    Canceled,
    TimedOut,
    Rejected,
    #[default]
    Unknown,
}

impl RunStatus {
    /// All statuses, for per-status counting.
    pub const ALL: &'static [Self] = &[
        Self::Success,
        Self::Failed,
        Self::Running,
        Self::Queued,
        Self::Canceled,
        Self::TimedOut,
        Self::Rejected,
        Self::Unknown,
    ];

    /// Parse a status string, folding unknown values into `Unknown`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" | "succeeded" | "completed" => Self::Success,
            "failed" | "failure" | "error" => Self::Failed,
            "running" | "in_progress" => Self::Running,
            "queued" | "pending" => Self::Queued,
            "canceled" | "cancelled" => Self::Canceled,
            "timed_out" | "timeout" => Self::TimedOut,
            "rejected" => Self::Rejected,
            _ => Self::Unknown,
        }
    }

    /// Wire label used in output documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Running => "running",
            Self::Queued => "queued",
            Self::Canceled => "canceled",
            Self::TimedOut => "timed_out",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }
}

/// Token counts for a single run.
///
/// `total_tokens` is always recomputed from the four components; totals
/// carried by the source are never trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Build from components, recomputing the total.
    #[must_use]
    pub const fn from_parts(
        input_tokens: u64,
        output_tokens: u64,
        cache_read_tokens: u64,
        cache_creation_tokens: u64,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_read_tokens,
            cache_creation_tokens,
            total_tokens: input_tokens
                + output_tokens
                + cache_read_tokens
                + cache_creation_tokens,
        }
    }

    /// Whether all components are zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }
}

/// One execution of the CLI gateway, normalized from a `record.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    pub status: RunStatus,

    /// Full command text; truncation happens only at projection time.
    pub command: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,

    /// Wall-clock seconds, derived from `finished_at - started_at` when both
    /// are present and ordered; never negative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl RunRecord {
    /// Recomputed token total, zero when no usage was recovered.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.token_usage.map_or(0, |t| t.total_tokens)
    }
}

// =============================================================================
// Usage Document
// =============================================================================

/// Provenance of a `UsageDocument`: authoritative API data or locally
/// derived estimates. The two are never blended within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageSource {
    #[serde(rename = "api")]
    Api,
    #[serde(rename = "gateway-fallback")]
    GatewayFallback,
}

/// A single rate/quota window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageWindow {
    /// Percentage of the window consumed, in `[0, 100]`, one decimal.
    pub used_percent: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,

    /// Human reset description; free text, never parsed downstream.
    pub reset_description: String,

    /// Window length in minutes; positive.
    pub window_minutes: i64,
}

impl UsageWindow {
    /// Percentage remaining in this window.
    #[must_use]
    pub fn remaining_percent(&self) -> f64 {
        (100.0 - self.used_percent).max(0.0)
    }
}

/// Account identity attached to the usage document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageIdentity {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "loginMethod")]
    pub login_method: String,
}

/// Normalized usage snapshot for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDocument {
    pub identity: UsageIdentity,

    /// Duplicated from `identity` for compatibility with the older
    /// dashboard generation.
    pub login_method: String,

    pub updated_at: DateTime<Utc>,

    pub primary: Option<UsageWindow>,
    pub secondary: Option<UsageWindow>,
    pub tertiary: Option<UsageWindow>,

    pub source: UsageSource,

    /// Diagnostic note (e.g. why the fallback path was taken).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// =============================================================================
// Credits
// =============================================================================

/// A credit balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditEvent {
    pub ts: DateTime<Utc>,
    pub delta: f64,
    pub note: String,
}

/// Credit balance snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsDocument {
    pub remaining: Option<f64>,
    pub updated_at: DateTime<Utc>,
    /// Insertion order preserved, most-recent-last, capped to
    /// [`CREDIT_EVENTS_CAP`] (oldest dropped first).
    pub events: Vec<CreditEvent>,
}

impl CreditsDocument {
    /// Empty credits document (remaining unknown).
    #[must_use]
    pub const fn empty(updated_at: DateTime<Utc>) -> Self {
        Self {
            remaining: None,
            updated_at,
            events: Vec::new(),
        }
    }

    /// Enforce the event cap, dropping oldest entries first.
    pub fn cap_events(&mut self) {
        if self.events.len() > CREDIT_EVENTS_CAP {
            let drop = self.events.len() - CREDIT_EVENTS_CAP;
            self.events.drain(..drop);
        }
    }
}

// =============================================================================
// History
// =============================================================================

/// One run projected for the activity timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub ts: DateTime<Utc>,
    pub provider: String,
    pub account: String,

    /// Derived activity score in `[1, 100]`.
    pub activity: u8,

    /// Duplicated from `activity` for the older dashboard generation.
    pub session_pct: u8,

    pub run_id: String,

    /// Bounded command prefix.
    pub command: String,

    pub status: RunStatus,

    pub duration: Option<i64>,
    pub workspace: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

// =============================================================================
// Stats
// =============================================================================

/// Per-status run counts. Unrecognized statuses land in `unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub success: u64,
    pub failed: u64,
    pub running: u64,
    pub queued: u64,
    pub canceled: u64,
    pub timed_out: u64,
    pub rejected: u64,
    pub unknown: u64,
}

impl StatusCounts {
    /// Increment the bucket for a status.
    pub const fn record(&mut self, status: RunStatus) {
        match status {
            RunStatus::Success => self.success += 1,
            RunStatus::Failed => self.failed += 1,
            RunStatus::Running => self.running += 1,
            RunStatus::Queued => self.queued += 1,
            RunStatus::Canceled => self.canceled += 1,
            RunStatus::TimedOut => self.timed_out += 1,
            RunStatus::Rejected => self.rejected += 1,
            RunStatus::Unknown => self.unknown += 1,
        }
    }

    /// Total runs across all buckets.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.success
            + self.failed
            + self.running
            + self.queued
            + self.canceled
            + self.timed_out
            + self.rejected
            + self.unknown
    }
}

/// Bounded projection of a run for the `recentRuns` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRun {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub command: String,
    pub duration: Option<i64>,
    pub workspace: Option<String>,
    pub exit_code: Option<i64>,
    pub total_tokens: u64,
}

/// Aggregate counters for `kimi-stats.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDocument {
    pub last_updated: DateTime<Utc>,
    pub total_runs: u64,
    /// `"ready"` once the record scan completed, regardless of count.
    pub status: String,
    pub summary: StatsSummary,
    pub recent_runs: Vec<RecentRun>,
}

/// Summary block inside the stats document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub counts: StatusCounts,
    /// `100 * success / total`, one decimal, `0` when no runs.
    pub success_rate: f64,
}

// =============================================================================
// Gateway Metrics (usage.json supplement)
// =============================================================================

/// Rate metrics derived from the local run list, embedded in the usage
/// document for the dashboard's gateway panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStats {
    pub total_runs: u64,
    pub runs_today: u64,
    pub runs_this_week: u64,
    #[serde(rename = "runsLast5Min")]
    pub runs_last_5_min: u64,
    pub runs_last_hour: u64,
    #[serde(rename = "rpm5Min")]
    pub rpm_5_min: f64,
    pub rpm_hour: f64,
    /// Mean duration of successful runs, rounded seconds.
    pub avg_duration: i64,
    pub success_rate: f64,
    pub successful: u64,
    pub failed: u64,
}

// =============================================================================
// Usage Payload (kimi-usage.json envelope)
// =============================================================================

/// Complete `kimi-usage.json` document: normalized usage plus provenance,
/// credits, and gateway run-count summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePayload {
    pub provider: String,
    pub source: UsageSource,
    pub version: String,
    pub usage: UsageDocument,
    pub credits: CreditsDocument,
    pub gateway_stats: GatewayStats,
}
