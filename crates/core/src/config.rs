//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the store adapters
//! and services. Request handlers never read process-wide environment variables, which keeps
//! behaviour consistent across worker threads and test harnesses.

use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_NAMESPACE, PHI_DIR_NAME, WORKFLOW_DB_FILENAME};
use crate::{ReferralError, ReferralResult};
use referra_types::NonEmptyText;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    workflow_db_path: PathBuf,
    namespace: NonEmptyText,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// When `workflow_db_path` is `None` the database lives at
    /// `<data_dir>/workflow.sqlite3`.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralError::InvalidInput`] if `data_dir` exists but is not a directory.
    pub fn new(
        data_dir: PathBuf,
        workflow_db_path: Option<PathBuf>,
        namespace: NonEmptyText,
    ) -> ReferralResult<Self> {
        if data_dir.exists() && !data_dir.is_dir() {
            return Err(ReferralError::InvalidInput(format!(
                "data directory is not a directory: {}",
                data_dir.display()
            )));
        }

        let workflow_db_path =
            workflow_db_path.unwrap_or_else(|| data_dir.join(WORKFLOW_DB_FILENAME));

        Ok(Self {
            data_dir,
            workflow_db_path,
            namespace,
        })
    }

    /// Resolves configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Environment Variables
    /// - `REFERRA_DATA_DIR`: data root (default: "referra_data")
    /// - `REFERRA_WORKFLOW_DB`: workflow database path (default: `<data>/workflow.sqlite3`)
    /// - `REFERRA_NAMESPACE`: deployment namespace (default: "referra.dev.1")
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is invalid or the data directory is not a directory.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ReferralResult<Self> {
        let data_dir = PathBuf::from(
            lookup("REFERRA_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into()),
        );
        let workflow_db = lookup("REFERRA_WORKFLOW_DB").map(PathBuf::from);
        let namespace = namespace_from_env_value(lookup("REFERRA_NAMESPACE"))?;

        Self::new(data_dir, workflow_db, namespace)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Root of the PHI document collection.
    pub fn phi_dir(&self) -> PathBuf {
        self.data_dir.join(PHI_DIR_NAME)
    }

    pub fn workflow_db_path(&self) -> &Path {
        &self.workflow_db_path
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_str()
    }
}

/// Parse the deployment namespace from an optional string value.
///
/// If `value` is `None` or blank, returns the default namespace.
pub fn namespace_from_env_value(value: Option<String>) -> ReferralResult<NonEmptyText> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    NonEmptyText::new(&value).map_err(|e| ReferralError::InvalidInput(e.to_string()))
}
