//! Constants used throughout the Referra core crate.
//!
//! Path and filename constants live here so the store adapters and configuration agree on the
//! on-disk layout.

/// Default directory for Referra data when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "referra_data";

/// Directory name (under the data directory) holding the PHI document collection.
pub const PHI_DIR_NAME: &str = "phi";

/// Filename of a single PHI document inside its sharded directory.
pub const PHI_DOCUMENT_FILENAME: &str = "phi.json";

/// Default filename of the SQLite workflow database (under the data directory).
pub const WORKFLOW_DB_FILENAME: &str = "workflow.sqlite3";

/// Default deployment namespace reported by health checks.
pub const DEFAULT_NAMESPACE: &str = "referra.dev.1";

/// Fields a referral submission must carry before anything is written.
///
/// Names are the JSON wire names so rejection messages can be shown to API clients as-is.
pub const REQUIRED_SUBMISSION_FIELDS: [&str; 5] = [
    "firstName",
    "lastName",
    "dateOfBirth",
    "pmiNumber",
    "waiverType",
];

/// Fields a standalone PHI document must carry.
pub const REQUIRED_PHI_FIELDS: [&str; 4] = ["firstName", "lastName", "dateOfBirth", "pmiNumber"];
