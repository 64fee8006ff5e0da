//! Command-line interface.
//!
//! Every knob has an environment counterpart so the scheduler unit that
//! triggers collection can configure the binary without flags. Flags win
//! over environment, environment over built-in defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::core::config::Config;
use crate::core::logging::{LogFormat, LogLevel};

/// Usage telemetry collector for the Kimi CLI gateway.
///
/// Reads run records from the gateway state directory, optionally queries
/// the usage API, and writes kimi-usage.json, kimi-history.json, and
/// kimi-stats.json to each output directory.
#[derive(Debug, Parser)]
#[command(name = "kimi-usage", version, about, long_about = None)]
pub struct Cli {
    /// Gateway state directory containing the runs/ store.
    #[arg(long, env = "KIMI_STATE_DIR", value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Output directory; repeat the flag (or colon-separate in the env
    /// var) to write documents to several locations.
    #[arg(
        long = "output-dir",
        env = "KIMI_USAGE_OUTPUT_DIRS",
        value_name = "DIR",
        value_delimiter = ':'
    )]
    pub output_dirs: Vec<PathBuf>,

    /// Usage API base URL.
    #[arg(long, env = "KIMI_USAGE_API_BASE", value_name = "URL")]
    pub api_base: Option<String>,

    /// Hard timeout for the single usage API attempt, in milliseconds.
    #[arg(long, env = "KIMI_USAGE_API_TIMEOUT_MS", value_name = "MS")]
    pub api_timeout_ms: Option<u64>,

    /// Credential TOML file checked when no API key env var is set.
    #[arg(long, env = "KIMI_USAGE_CREDENTIALS", value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// Maximum history entries kept on disk.
    #[arg(long, env = "KIMI_USAGE_HISTORY_LIMIT", value_name = "N")]
    pub history_limit: Option<usize>,

    /// Lookback window for proposing new history entries, in days.
    #[arg(long, env = "KIMI_USAGE_HISTORY_LOOKBACK_DAYS", value_name = "DAYS")]
    pub history_lookback_days: Option<i64>,

    /// Number of runs kept in the stats document's recentRuns list.
    #[arg(long, env = "KIMI_USAGE_RECENT_RUNS", value_name = "N")]
    pub recent_runs: Option<usize>,

    /// Tokens per activity point when scoring history entries.
    #[arg(long, env = "KIMI_USAGE_TOKENS_PER_POINT", value_name = "N")]
    pub tokens_per_point: Option<u64>,

    /// Session window length for fallback estimation, in minutes.
    #[arg(long, env = "KIMI_USAGE_SESSION_WINDOW_MINUTES", value_name = "MIN")]
    pub session_window_minutes: Option<i64>,

    /// Week window length for fallback estimation, in minutes.
    #[arg(long, env = "KIMI_USAGE_WEEK_WINDOW_MINUTES", value_name = "MIN")]
    pub week_window_minutes: Option<i64>,

    /// Session token budget for fallback estimation.
    #[arg(long, env = "KIMI_USAGE_SESSION_TOKEN_BUDGET", value_name = "TOKENS")]
    pub session_token_budget: Option<u64>,

    /// Week token budget for fallback estimation.
    #[arg(long, env = "KIMI_USAGE_WEEK_TOKEN_BUDGET", value_name = "TOKENS")]
    pub week_token_budget: Option<u64>,

    /// Promote info logging to debug.
    #[arg(short, long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log format (human, json, compact).
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Append logs to a file instead of stderr.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Resolve the collector configuration, flags over defaults.
    #[must_use]
    pub fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            state_dir: self.state_dir.unwrap_or(defaults.state_dir),
            output_dirs: if self.output_dirs.is_empty() {
                defaults.output_dirs
            } else {
                self.output_dirs
            },
            api_base: self.api_base.unwrap_or(defaults.api_base),
            api_timeout_ms: self.api_timeout_ms.unwrap_or(defaults.api_timeout_ms),
            credentials_path: self.credentials,
            history_limit: self.history_limit.unwrap_or(defaults.history_limit),
            history_lookback_days: self
                .history_lookback_days
                .unwrap_or(defaults.history_lookback_days),
            recent_runs: self.recent_runs.unwrap_or(defaults.recent_runs),
            tokens_per_point: self.tokens_per_point.unwrap_or(defaults.tokens_per_point),
            session_window_minutes: self
                .session_window_minutes
                .unwrap_or(defaults.session_window_minutes),
            week_window_minutes: self
                .week_window_minutes
                .unwrap_or(defaults.week_window_minutes),
            session_token_budget: self
                .session_token_budget
                .unwrap_or(defaults.session_token_budget),
            week_token_budget: self.week_token_budget.unwrap_or(defaults.week_token_budget),
        }
    }

    /// Effective log level: flag, then env var, then the default.
    #[must_use]
    pub fn effective_log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::from_arg)
            .or_else(crate::core::logging::parse_log_level_from_env)
            .unwrap_or_default()
    }

    /// Effective log format: flag, then env var, then the default.
    #[must_use]
    pub fn effective_log_format(&self) -> LogFormat {
        self.log_format
            .as_deref()
            .and_then(LogFormat::from_arg)
            .or_else(crate::core::logging::parse_log_format_from_env)
            .unwrap_or_default()
    }

    /// Effective log file: flag, then env var.
    #[must_use]
    pub fn effective_log_file(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(crate::core::logging::parse_log_file_from_env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{DEFAULT_API_BASE, DEFAULT_HISTORY_LIMIT};

    #[test]
    fn defaults_apply_with_no_flags() {
        let cli = Cli::try_parse_from(["kimi-usage"]).unwrap();
        let config = cli.into_config();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert!(!config.output_dirs.is_empty());
    }

    #[test]
    fn repeated_output_dirs_collect() {
        let cli = Cli::try_parse_from([
            "kimi-usage",
            "--output-dir",
            "/tmp/a",
            "--output-dir",
            "/tmp/b",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.output_dirs.len(), 2);
        assert_eq!(config.output_dirs[1], PathBuf::from("/tmp/b"));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "kimi-usage",
            "--state-dir",
            "/var/lib/kimi",
            "--api-timeout-ms",
            "5000",
            "--session-token-budget",
            "12345",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/kimi"));
        assert_eq!(config.api_timeout_ms, 5000);
        assert_eq!(config.session_token_budget, 12_345);
    }

    #[test]
    fn log_flags_parse() {
        let cli = Cli::try_parse_from([
            "kimi-usage",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.effective_log_level(), LogLevel::Debug);
        assert_eq!(cli.effective_log_format(), LogFormat::Json);
    }

    #[test]
    fn bad_numeric_flag_is_rejected() {
        assert!(Cli::try_parse_from(["kimi-usage", "--api-timeout-ms", "soon"]).is_err());
    }
}
