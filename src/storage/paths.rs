//! Default filesystem locations.

use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};

/// File name of the usage document.
pub const USAGE_FILE: &str = "kimi-usage.json";

/// File name of the history document.
pub const HISTORY_FILE: &str = "kimi-history.json";

/// File name of the stats document.
pub const STATS_FILE: &str = "kimi-stats.json";

/// Default gateway state directory (`~/.kimi-gateway-state/cli-bridge-kimi`).
#[must_use]
pub fn default_state_dir() -> PathBuf {
    home_dir().join(".kimi-gateway-state").join("cli-bridge-kimi")
}

/// Default output directory for the generated documents.
#[must_use]
pub fn default_output_dir() -> PathBuf {
    ProjectDirs::from("", "", "kimi-usage").map_or_else(
        || home_dir().join(".local/share/kimi-usage/data"),
        |dirs| dirs.data_dir().join("data"),
    )
}

/// Default credential config file (`~/.kimi/config.toml`).
#[must_use]
pub fn default_credentials_path() -> PathBuf {
    home_dir().join(".kimi").join("config.toml")
}

fn home_dir() -> PathBuf {
    BaseDirs::new().map_or_else(|| PathBuf::from("."), |d| d.home_dir().to_path_buf())
}
