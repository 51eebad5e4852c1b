//! Process configuration for the REST server.
//!
//! Read once at startup from environment variables (after `.env` has been loaded).

use referra_core::CoreConfig;
use std::path::PathBuf;

/// Default listen address.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Default location of the YAML sessions file.
pub const DEFAULT_SESSIONS_FILE: &str = "sessions.yaml";

#[derive(Clone, Debug)]
pub struct RestConfig {
    pub addr: String,
    pub sessions_file: PathBuf,
    pub core: CoreConfig,
}

impl RestConfig {
    /// Resolves configuration from the environment.
    ///
    /// # Environment Variables
    /// - `REFERRA_REST_ADDR`: listen address (default: "0.0.0.0:3000")
    /// - `REFERRA_DATA_DIR`: data root (default: "referra_data")
    /// - `REFERRA_WORKFLOW_DB`: workflow database path (default: `<data>/workflow.sqlite3`)
    /// - `REFERRA_SESSIONS_FILE`: sessions file (default: "sessions.yaml")
    /// - `REFERRA_NAMESPACE`: deployment namespace (default: "referra.dev.1")
    ///
    /// # Errors
    /// Returns an error if the namespace is invalid or the data directory is not a directory.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let addr = lookup("REFERRA_REST_ADDR").unwrap_or_else(|| DEFAULT_REST_ADDR.into());
        let sessions_file = PathBuf::from(
            lookup("REFERRA_SESSIONS_FILE").unwrap_or_else(|| DEFAULT_SESSIONS_FILE.into()),
        );

        Ok(Self {
            addr,
            sessions_file,
            core: CoreConfig::from_lookup(&lookup)?,
        })
    }
}
