//! One collection cycle, end to end.
//!
//! The API fetch and the local record scan are independent, so they run
//! concurrently: the fetch on the async runtime under its hard timeout,
//! the directory scan on the blocking pool. The normalizer combines the
//! results, then the three documents are written. Documents are recomputed
//! from scratch every cycle; repeated cycles over identical input and a
//! fixed clock produce identical output.

use chrono::{DateTime, Utc};

use crate::core::config::{Config, PROVIDER_ID};
use crate::core::models::{CreditsDocument, UsagePayload, UsageSource};
use crate::core::usage_api::ApiOutcome;
use crate::core::{fallback, history, http, normalize, runs, stats, usage_api};
use crate::error::Result;
use crate::storage::{paths, writer};

/// What happened during one cycle, for logging and exit status.
#[derive(Debug)]
pub struct CycleSummary {
    pub run_count: usize,
    pub source: UsageSource,
    pub note: Option<String>,
    pub history_entries: usize,
    pub destinations_written: usize,
    pub destination_failures: usize,
}

/// Run a collection cycle against the current clock.
///
/// # Errors
/// Returns an error only for invalid configuration or when some document
/// could not be written to any destination.
pub async fn collect_once(config: &Config) -> Result<CycleSummary> {
    run_cycle(config, Utc::now()).await
}

/// Run a collection cycle with an explicit clock.
///
/// # Errors
/// Same contract as [`collect_once`].
pub async fn run_cycle(config: &Config, now: DateTime<Utc>) -> Result<CycleSummary> {
    config.validate()?;

    let state_dir = config.state_dir.clone();
    let scan = tokio::task::spawn_blocking(move || runs::load_runs(&state_dir));
    let (api_outcome, scan_result) = tokio::join!(fetch_api(config), scan);

    let run_list = match scan_result {
        Ok(list) => list,
        Err(e) => {
            tracing::error!(error = %e, "record scan task failed, treating store as empty");
            Vec::new()
        }
    };
    tracing::debug!(runs = run_list.len(), "record store scanned");

    let (windows, source, note, credits) = match &api_outcome {
        ApiOutcome::Payload(payload) => match normalize::windows_from_payload(payload, now) {
            Some(windows) => (
                windows,
                UsageSource::Api,
                None,
                normalize::credits_from_payload(payload, now),
            ),
            None => (
                fallback::estimate_windows(&run_list, config, now),
                UsageSource::GatewayFallback,
                Some("usage API returned no usable windows".to_string()),
                CreditsDocument::empty(now),
            ),
        },
        outcome => (
            fallback::estimate_windows(&run_list, config, now),
            UsageSource::GatewayFallback,
            outcome.note().map(ToString::to_string),
            CreditsDocument::empty(now),
        ),
    };
    if let Some(reason) = &note {
        tracing::info!(reason, "using gateway-fallback estimation");
    }

    let usage = UsagePayload {
        provider: PROVIDER_ID.to_string(),
        source,
        version: env!("CARGO_PKG_VERSION").to_string(),
        usage: normalize::build_usage_document(windows, source, note.clone(), now),
        credits,
        gateway_stats: stats::gateway_stats(&run_list, now),
    };
    let proposed_history = history::build_history(&run_list, config, now);
    let stats_doc = stats::build_stats(&run_list, config.recent_runs, now);

    let usage_outcome =
        writer::write_to_destinations(&config.output_dirs, paths::USAGE_FILE, &usage)?;
    let history_outcome = writer::write_history(
        &config.output_dirs,
        paths::HISTORY_FILE,
        &proposed_history,
        config.history_limit,
    )?;
    let stats_outcome =
        writer::write_to_destinations(&config.output_dirs, paths::STATS_FILE, &stats_doc)?;

    let summary = CycleSummary {
        run_count: run_list.len(),
        source,
        note,
        history_entries: proposed_history.len(),
        destinations_written: usage_outcome.written.len()
            + history_outcome.written.len()
            + stats_outcome.written.len(),
        destination_failures: usage_outcome.failures.len()
            + history_outcome.failures.len()
            + stats_outcome.failures.len(),
    };
    tracing::info!(
        runs = summary.run_count,
        source = ?summary.source,
        written = summary.destinations_written,
        failed = summary.destination_failures,
        "collection cycle complete"
    );
    Ok(summary)
}

async fn fetch_api(config: &Config) -> ApiOutcome {
    let client = match http::build_client(config.api_timeout_ms) {
        Ok(client) => client,
        Err(e) => return ApiOutcome::Failed(e.to_string()),
    };
    let credentials_path = config
        .credentials_path
        .clone()
        .unwrap_or_else(paths::default_credentials_path);
    usage_api::collect(&client, &config.api_base, &credentials_path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap()
    }

    fn write_run(state: &std::path::Path, name: &str, record: &Value) {
        let dir = state.join("runs").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("record.json"), record.to_string()).unwrap();
    }

    fn offline_config(tmp: &TempDir) -> Config {
        Config {
            state_dir: tmp.path().join("state"),
            output_dirs: vec![tmp.path().join("out")],
            // Nonexistent credential file and no env key: the API path
            // reports unavailability without touching the network.
            credentials_path: Some(tmp.path().join("no-such-config.toml")),
            ..Config::default()
        }
    }

    fn read_json(path: &std::path::Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn offline_cycle_writes_fallback_documents() {
        let tmp = TempDir::new().unwrap();
        let config = offline_config(&tmp);
        write_run(
            &config.state_dir,
            "run-1",
            &json!({
                "runId": "run-1",
                "createdAt": "2026-01-18T11:59:00Z",
                "status": "success",
                "command": "kimi run build",
                "tokenUsage": {"inputTokens": 1000, "outputTokens": 500}
            }),
        );

        let summary = run_cycle(&config, fixed_now()).await.unwrap();
        assert_eq!(summary.run_count, 1);
        assert_eq!(summary.source, UsageSource::GatewayFallback);
        assert!(summary.note.is_some());
        assert_eq!(summary.destination_failures, 0);

        let out = tmp.path().join("out");
        let usage = read_json(&out.join(paths::USAGE_FILE));
        assert_eq!(usage["source"], "gateway-fallback");
        assert_eq!(usage["usage"]["identity"]["providerID"], "kimi");
        assert!(usage["usage"]["primary"]["usedPercent"].is_number());
        assert_eq!(usage["gatewayStats"]["totalRuns"], 1);

        let history = read_json(&out.join(paths::HISTORY_FILE));
        assert_eq!(history.as_array().unwrap().len(), 1);

        let stats = read_json(&out.join(paths::STATS_FILE));
        assert_eq!(stats["status"], "ready");
        assert_eq!(stats["totalRuns"], 1);
    }

    #[tokio::test]
    async fn repeated_cycles_are_idempotent() {
        let tmp = TempDir::new().unwrap();
        let config = offline_config(&tmp);
        write_run(
            &config.state_dir,
            "run-1",
            &json!({
                "runId": "run-1",
                "createdAt": "2026-01-18T11:00:00Z",
                "status": "success",
                "command": "kimi run test"
            }),
        );

        let now = fixed_now();
        run_cycle(&config, now).await.unwrap();
        let first_usage =
            std::fs::read_to_string(tmp.path().join("out").join(paths::USAGE_FILE)).unwrap();
        let first_history =
            std::fs::read_to_string(tmp.path().join("out").join(paths::HISTORY_FILE)).unwrap();

        run_cycle(&config, now).await.unwrap();
        let second_usage =
            std::fs::read_to_string(tmp.path().join("out").join(paths::USAGE_FILE)).unwrap();
        let second_history =
            std::fs::read_to_string(tmp.path().join("out").join(paths::HISTORY_FILE)).unwrap();

        assert_eq!(first_usage, second_usage);
        assert_eq!(first_history, second_history);
    }

    #[tokio::test]
    async fn empty_store_still_produces_ready_documents() {
        let tmp = TempDir::new().unwrap();
        let config = offline_config(&tmp);

        let summary = run_cycle(&config, fixed_now()).await.unwrap();
        assert_eq!(summary.run_count, 0);

        let stats = read_json(&tmp.path().join("out").join(paths::STATS_FILE));
        assert_eq!(stats["status"], "ready");
        assert_eq!(stats["totalRuns"], 0);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_any_io() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            output_dirs: Vec::new(),
            ..offline_config(&tmp)
        };
        assert!(run_cycle(&config, fixed_now()).await.is_err());
    }
}
