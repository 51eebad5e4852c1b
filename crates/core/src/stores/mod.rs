//! Store adapters for the two independently owned datastores.
//!
//! - [`PhiStore`]: the PHI document collection, keyed by [`RecordId`].
//! - [`WorkflowStore`]: the relational `referrals` table, keyed by an integer id.
//!
//! Both traits are object safe and `Send + Sync` so services can hold them as
//! `Arc<dyn PhiStore>` / `Arc<dyn WorkflowStore>` and tests can swap in doubles.

pub mod phi;
pub mod workflow;

pub use phi::FilePhiStore;
pub use workflow::SqliteWorkflowStore;

use crate::phi::{NewPhiRecord, PhiRecord};
use crate::referral::{NewReferral, ReferralRecord, ReferralStatus};
use crate::ReferralResult;
use async_trait::async_trait;
use referra_uuid::RecordId;

/// Create/read/list/delete against the PHI document collection.
#[async_trait]
pub trait PhiStore: Send + Sync {
    /// Stores a new document and returns it with its generated id and timestamps.
    async fn insert(&self, new: NewPhiRecord) -> ReferralResult<PhiRecord>;

    /// Fetches one document, or `None` when no document has this id.
    async fn get(&self, id: &RecordId) -> ReferralResult<Option<PhiRecord>>;

    /// Every document owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> ReferralResult<Vec<PhiRecord>>;

    /// Removes a document. Used only to compensate a failed submission.
    ///
    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, id: &RecordId) -> ReferralResult<bool>;

    /// Cheap reachability check for health reporting.
    async fn ping(&self) -> ReferralResult<()>;
}

/// Create/read/list/update against the relational `referrals` table.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Inserts a row and returns it with the id and timestamps assigned by the store.
    async fn insert(&self, new: NewReferral) -> ReferralResult<ReferralRecord>;

    async fn get(&self, id: i64) -> ReferralResult<Option<ReferralRecord>>;

    /// Rows owned by `case_manager_id`, newest first.
    async fn list_by_case_manager(&self, case_manager_id: &str)
        -> ReferralResult<Vec<ReferralRecord>>;

    /// Rows in `status` across all case managers, newest first.
    async fn list_by_status(&self, status: ReferralStatus) -> ReferralResult<Vec<ReferralRecord>>;

    /// Sets the status of one row and bumps `updated_at`.
    ///
    /// Returns `None` when the row does not exist.
    async fn update_status(
        &self,
        id: i64,
        status: ReferralStatus,
    ) -> ReferralResult<Option<ReferralRecord>>;

    async fn ping(&self) -> ReferralResult<()>;
}
