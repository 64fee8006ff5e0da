//! Error types for the collector.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! The error surface here is deliberately small: per the collection
//! contract, most failure modes (missing state directory, corrupt run
//! record, absent combined log, missing credential, API timeout) degrade to
//! "skip this unit" or "use the fallback" and never become errors at all.
//! `CollectorError` covers only what is fatal for a cycle or diagnostic for
//! the operator.

use thiserror::Error;

/// Exit codes for the `kimi-usage` binary.
///
/// A completed cycle exits 0 even when the API path failed and local
/// fallback estimation was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Collection cycle completed.
    Success = 0,
    /// Unexpected failure (bad config, I/O outside the tolerated set).
    GeneralError = 1,
    /// No output destination could be written.
    WriteFailed = 2,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for collector operations.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Configuration error (invalid env value, unusable paths).
    #[error("configuration error: {0}")]
    Config(String),

    /// A document could not be written to any destination.
    #[error("failed to write {document} to any destination: {details}")]
    AllDestinationsFailed { document: String, details: String },

    /// Usage API request failed (timeout, non-2xx, malformed body).
    ///
    /// Carried as a diagnostic on the fallback path, never fatal on its own.
    #[error("usage API error: {0}")]
    Api(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for wrapped errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CollectorError {
    /// Map the error to a process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::AllDestinationsFailed { .. } => ExitCode::WriteFailed,
            _ => ExitCode::GeneralError,
        }
    }
}

/// Result alias for collector operations.
pub type Result<T, E = CollectorError> = std::result::Result<T, E>;

/// Truncate a diagnostic message to at most `max_len` characters for
/// embedding in output documents, ellipsis included in the bound.
#[must_use]
pub fn truncate_diagnostic(message: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    if message.chars().count() <= max_len {
        return message.to_string();
    }
    let mut out: String = message.chars().take(max_len - 1).collect();
    out.push('…');
    out
}
