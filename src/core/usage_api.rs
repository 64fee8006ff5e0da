//! Remote usage API client.
//!
//! Key resolution checks environment variables first, then a local TOML
//! credential file with `[providers."<name>"]` sections. A missing key is
//! ordinary unavailability, not an error; the caller switches to local
//! estimation. With a key, exactly one bounded GET is issued per cycle;
//! timeouts, non-2xx statuses, and unparseable bodies all surface as a
//! typed failure carrying a truncated diagnostic.

use std::path::Path;

use serde_json::Value;

use crate::error::truncate_diagnostic;

/// Environment variables checked for an API key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["KIMI_API_KEY", "MOONSHOT_API_KEY"];

/// Path suffix appended to the configured base URL.
pub const USAGE_ENDPOINT: &str = "/usages";

/// Maximum diagnostic length embedded in output documents.
const DIAGNOSTIC_MAX_LEN: usize = 200;

/// Outcome of the API path for one collection cycle.
#[derive(Debug, Clone)]
pub enum ApiOutcome {
    /// 2xx response with a JSON body.
    Payload(Value),
    /// No API key resolved; the fallback path applies.
    Unavailable(String),
    /// Request made but failed (timeout, non-2xx, malformed body).
    Failed(String),
}

impl ApiOutcome {
    /// Diagnostic note for the output document, `None` on success.
    #[must_use]
    pub fn note(&self) -> Option<&str> {
        match self {
            Self::Payload(_) => None,
            Self::Unavailable(reason) | Self::Failed(reason) => Some(reason),
        }
    }
}

/// Resolve an API key from the environment, then the credential file.
#[must_use]
pub fn resolve_api_key(credentials_path: &Path) -> Option<String> {
    if let Some(key) = api_key_from_env() {
        tracing::debug!("API key resolved from environment");
        return Some(key);
    }
    let key = api_key_from_config(credentials_path);
    if key.is_some() {
        tracing::debug!(path = %credentials_path.display(), "API key resolved from credential file");
    }
    key
}

fn api_key_from_env() -> Option<String> {
    API_KEY_ENV_VARS.iter().find_map(|var| {
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Read an API key from a TOML credential file.
///
/// Sections look like `[providers."kimi-code"]` with an `api_key` value.
/// Sections whose name mentions `code` are preferred over generic ones,
/// matching how the gateway names its coding-agent credentials.
#[must_use]
pub fn api_key_from_config(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let parsed: toml::Value = content.parse().ok()?;
    let providers = parsed.get("providers")?.as_table()?;

    let key_of = |section: &toml::Value| {
        section
            .get("api_key")
            .and_then(toml::Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(ToString::to_string)
    };

    providers
        .iter()
        .filter(|(name, _)| name.to_ascii_lowercase().contains("code"))
        .find_map(|(_, section)| key_of(section))
        .or_else(|| providers.values().find_map(key_of))
}

/// Fetch the usage payload. One attempt, no retries.
pub async fn fetch_usage(client: &reqwest::Client, base_url: &str, api_key: &str) -> ApiOutcome {
    let url = format!("{}{USAGE_ENDPOINT}", base_url.trim_end_matches('/'));

    let response = match client.get(&url).bearer_auth(api_key).send().await {
        Ok(response) => response,
        Err(e) => {
            let kind = if e.is_timeout() { "timeout" } else { "request error" };
            return ApiOutcome::Failed(truncate_diagnostic(
                &format!("usage API {kind}: {e}"),
                DIAGNOSTIC_MAX_LEN,
            ));
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return ApiOutcome::Failed(truncate_diagnostic(
            &format!("usage API returned {status}: {body}"),
            DIAGNOSTIC_MAX_LEN,
        ));
    }

    match response.json::<Value>().await {
        Ok(payload) => ApiOutcome::Payload(payload),
        Err(e) => ApiOutcome::Failed(truncate_diagnostic(
            &format!("usage API body was not JSON: {e}"),
            DIAGNOSTIC_MAX_LEN,
        )),
    }
}

/// Run the whole API path for one cycle: resolve a key, then fetch.
pub async fn collect(
    client: &reqwest::Client,
    base_url: &str,
    credentials_path: &Path,
) -> ApiOutcome {
    match resolve_api_key(credentials_path) {
        Some(key) => fetch_usage(client, base_url, &key).await,
        None => ApiOutcome::Unavailable(
            "no API key found in environment or credential file".to_string(),
        ),
    }
}
