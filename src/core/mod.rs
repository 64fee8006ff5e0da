//! Core collection pipeline: record scanning, usage normalization, and
//! document assembly.

pub mod config;
pub mod fallback;
pub mod history;
pub mod http;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod run_logs;
pub mod runs;
pub mod stats;
pub mod usage_api;
