//! Usage telemetry collector for the Kimi CLI gateway.
//!
//! The gateway writes one record directory per run; this crate scans that
//! store, optionally queries the remote usage API, and normalizes both
//! into three JSON documents consumed by the dashboard: a usage snapshot
//! (`kimi-usage.json`), an additive activity timeline
//! (`kimi-history.json`), and aggregate run statistics
//! (`kimi-stats.json`). When the API is unreachable or unconfigured, usage
//! is estimated from local token sums and marked as such.
//!
//! All documents are recomputed from scratch each cycle and written
//! atomically, so a dashboard reading them concurrently never sees partial
//! content.

pub mod cli;
pub mod core;
pub mod error;
pub mod storage;
pub mod util;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::core::config::Config;
pub use crate::core::models::{
    HistoryEntry, RunRecord, RunStatus, StatsDocument, TokenUsage, UsageDocument, UsagePayload,
    UsageSource, UsageWindow,
};
pub use crate::core::pipeline::{CycleSummary, collect_once, run_cycle};
pub use crate::error::{CollectorError, ExitCode, Result};
