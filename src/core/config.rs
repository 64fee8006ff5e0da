//! Collector configuration.
//!
//! Everything is optional with stated defaults; values come from CLI flags
//! or their `KIMI_USAGE_*` / `KIMI_STATE_DIR` environment counterparts
//! (wired through clap's `env` feature in `cli::args`). The pipeline takes
//! the resolved `Config` plus an explicit "now" so cycles are deterministic
//! under test.

use std::path::PathBuf;

use crate::error::{CollectorError, Result};
use crate::storage::paths;

/// Default usage API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.moonshot.ai/v1";

/// Default API timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 15_000;

/// Default history entry cap.
pub const DEFAULT_HISTORY_LIMIT: usize = 2000;

/// Default history lookback in days.
pub const DEFAULT_HISTORY_LOOKBACK_DAYS: i64 = 30;

/// Default `recentRuns` length.
pub const DEFAULT_RECENT_RUNS: usize = 20;

/// Default tokens per activity point.
pub const DEFAULT_TOKENS_PER_POINT: u64 = 1000;

/// Default short fallback window (minutes).
pub const DEFAULT_SESSION_WINDOW_MINUTES: i64 = 300;

/// Default long fallback window (minutes).
pub const DEFAULT_WEEK_WINDOW_MINUTES: i64 = 10_080;

/// Default session token budget for fallback estimation.
pub const DEFAULT_SESSION_TOKEN_BUDGET: u64 = 5_000_000;

/// Default weekly token budget for fallback estimation.
pub const DEFAULT_WEEK_TOKEN_BUDGET: u64 = 35_000_000;

/// Provider identity constants for the usage document.
pub const PROVIDER_ID: &str = "kimi";

/// Login method label reported in the usage document.
pub const LOGIN_METHOD: &str = "Kimi Pro";

/// Resolved collector configuration for one cycle.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gateway state directory containing the `runs/` store.
    pub state_dir: PathBuf,
    /// Output directories each receiving all three documents.
    pub output_dirs: Vec<PathBuf>,
    /// Usage API base URL (`{base}/usages` is queried).
    pub api_base: String,
    /// Hard timeout for the single API attempt.
    pub api_timeout_ms: u64,
    /// Optional override for the credential config file.
    pub credentials_path: Option<PathBuf>,
    pub history_limit: usize,
    pub history_lookback_days: i64,
    pub recent_runs: usize,
    pub tokens_per_point: u64,
    pub session_window_minutes: i64,
    pub week_window_minutes: i64,
    pub session_token_budget: u64,
    pub week_token_budget: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: paths::default_state_dir(),
            output_dirs: vec![paths::default_output_dir()],
            api_base: DEFAULT_API_BASE.to_string(),
            api_timeout_ms: DEFAULT_API_TIMEOUT_MS,
            credentials_path: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_lookback_days: DEFAULT_HISTORY_LOOKBACK_DAYS,
            recent_runs: DEFAULT_RECENT_RUNS,
            tokens_per_point: DEFAULT_TOKENS_PER_POINT,
            session_window_minutes: DEFAULT_SESSION_WINDOW_MINUTES,
            week_window_minutes: DEFAULT_WEEK_WINDOW_MINUTES,
            session_token_budget: DEFAULT_SESSION_TOKEN_BUDGET,
            week_token_budget: DEFAULT_WEEK_TOKEN_BUDGET,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` for zero/negative windows, budgets,
    /// caps, or timeout, and when no output directory is configured.
    pub fn validate(&self) -> Result<()> {
        if self.output_dirs.is_empty() {
            return Err(CollectorError::Config(
                "at least one output directory is required".to_string(),
            ));
        }
        if self.api_timeout_ms == 0 {
            return Err(CollectorError::Config(
                "API timeout must be greater than 0 ms".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(CollectorError::Config(
                "history limit must be greater than 0".to_string(),
            ));
        }
        if self.history_lookback_days <= 0 {
            return Err(CollectorError::Config(
                "history lookback must be greater than 0 days".to_string(),
            ));
        }
        if self.tokens_per_point == 0 {
            return Err(CollectorError::Config(
                "tokens per activity point must be greater than 0".to_string(),
            ));
        }
        if self.session_window_minutes <= 0 || self.week_window_minutes <= 0 {
            return Err(CollectorError::Config(
                "fallback windows must be greater than 0 minutes".to_string(),
            ));
        }
        if self.session_token_budget == 0 || self.week_token_budget == 0 {
            return Err(CollectorError::Config(
                "fallback token budgets must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
