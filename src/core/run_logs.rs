//! Token usage recovery from combined run logs.
//!
//! When a run record carries no token counts, the gateway's combined log
//! usually still does: the underlying agent prints marker lines of the form
//!
//! ```text
//! token_usage = TokenUsage(input_other=1200, output=340, input_cache_read=800)
//! ```
//!
//! Key spellings differ between agent generations, so each component is
//! resolved through an ordered candidate list. A log can contain several
//! markers (one per turn); the one with the largest recomputed total wins,
//! since later turns report cumulative counts.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::models::TokenUsage;

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"token_usage\s*=\s*TokenUsage\(([^)]*)\)").expect("marker regex is valid")
});

const INPUT_KEYS: &[&str] = &["input_other", "input", "input_tokens"];
const OUTPUT_KEYS: &[&str] = &["output", "output_tokens"];
const CACHE_READ_KEYS: &[&str] = &["input_cache_read", "cache_read_input_tokens", "cache_read"];
const CACHE_CREATION_KEYS: &[&str] = &[
    "input_cache_creation",
    "cache_creation_input_tokens",
    "cache_creation",
];

/// Extract token usage from combined-log text.
///
/// Returns the marker with the largest recomputed total, or `None` when no
/// marker yields any tokens.
#[must_use]
pub fn extract_token_usage(text: &str) -> Option<TokenUsage> {
    MARKER
        .captures_iter(text)
        .filter_map(|caps| parse_marker(caps.get(1)?.as_str()))
        .filter(|usage| !usage.is_empty())
        .max_by_key(|usage| usage.total_tokens)
}

/// Extract token usage from a combined-log file.
///
/// Unreadable or missing files yield `None`; log recovery is best-effort.
#[must_use]
pub fn extract_from_log_file(path: &Path) -> Option<TokenUsage> {
    let text = std::fs::read_to_string(path).ok()?;
    extract_token_usage(&text)
}

fn parse_marker(inner: &str) -> Option<TokenUsage> {
    let mut fields: HashMap<&str, u64> = HashMap::new();
    for pair in inner.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if let Ok(n) = value.trim().parse::<u64>() {
            fields.insert(key.trim(), n);
        }
    }

    let pick = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| fields.get(key).copied())
            .unwrap_or(0)
    };

    Some(TokenUsage::from_parts(
        pick(INPUT_KEYS),
        pick(OUTPUT_KEYS),
        pick(CACHE_READ_KEYS),
        pick(CACHE_CREATION_KEYS),
    ))
}
