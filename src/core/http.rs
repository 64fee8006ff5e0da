//! Shared HTTP client construction.

use std::time::Duration;

use crate::error::{CollectorError, Result};

/// User agent sent with API requests.
pub const USER_AGENT: &str = concat!("kimi-usage/", env!("CARGO_PKG_VERSION"));

/// Build a client with a hard request timeout.
///
/// The timeout bounds the whole request, including connect and body read;
/// the collector makes exactly one attempt per cycle.
///
/// # Errors
/// Returns `CollectorError::Api` if the client cannot be constructed.
pub fn build_client(timeout_ms: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .connect_timeout(Duration::from_millis(timeout_ms.min(10_000)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CollectorError::Api(format!("failed to build HTTP client: {e}")))
}
