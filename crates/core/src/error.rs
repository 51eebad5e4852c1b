use referra_uuid::RecordId;

#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<&'static str>),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid identifier: {0}")]
    Uuid(#[from] referra_uuid::UuidError),

    #[error("PHI record not found: {0}")]
    PhiNotFound(RecordId),
    #[error("referral not found: {0}")]
    ReferralNotFound(i64),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write PHI document: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read PHI document: {0}")]
    FileRead(std::io::Error),
    #[error("failed to remove PHI document: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),

    #[error("workflow database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("workflow migration v{version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },
    #[error("invalid stored value for {field}: {value}")]
    InvalidStoredValue { field: &'static str, value: String },
    #[error("workflow store lock poisoned")]
    LockPoisoned,
    #[error("store backend unavailable: {0}")]
    Backend(String),
    #[error("background store task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error(
        "workflow write failed and PHI compensation also failed (phi_id: {phi_id}): write={write_error}; cleanup={cleanup_error}"
    )]
    CompensationFailed {
        phi_id: RecordId,
        #[source]
        write_error: Box<ReferralError>,
        cleanup_error: Box<ReferralError>,
    },
}

impl ReferralError {
    /// Returns true for errors caused by the caller's input rather than by a store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ReferralError::MissingRequiredFields(_)
                | ReferralError::InvalidField { .. }
                | ReferralError::InvalidInput(_)
                | ReferralError::Uuid(_)
        )
    }

    /// Returns true when the requested record does not exist (or is not visible to the caller).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReferralError::PhiNotFound(_) | ReferralError::ReferralNotFound(_)
        )
    }
}

pub type ReferralResult<T> = std::result::Result<T, ReferralError>;
