//! Application service over the two stores.
//!
//! [`ReferralService`] is what the REST layer and the CLI hold. It owns the store handles and
//! exposes one method per operation; owner checks happen here so every surface gets them.

use crate::config::CoreConfig;
use crate::dashboard::{build_dashboard, DashboardBucket, DashboardView};
use crate::form::ReferralForm;
use crate::phi::{PhiPayload, PhiRecord};
use crate::reconciliation::{self, ReconciledReferral};
use crate::referral::{ReferralRecord, ReferralStatus};
use crate::stores::{FilePhiStore, PhiStore, SqliteWorkflowStore, WorkflowStore};
use crate::submission::{submit_referral, SubmittedReferral};
use crate::{ReferralError, ReferralResult};
use referra_uuid::RecordId;
use serde::Serialize;
use std::sync::Arc;

/// Reachability of each backing store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoreHealth {
    pub phi_store: bool,
    pub workflow_store: bool,
}

impl StoreHealth {
    pub fn all_ok(&self) -> bool {
        self.phi_store && self.workflow_store
    }
}

#[derive(Clone)]
pub struct ReferralService {
    phi: Arc<dyn PhiStore>,
    workflow: Arc<dyn WorkflowStore>,
}

impl std::fmt::Debug for ReferralService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferralService").finish_non_exhaustive()
    }
}

impl ReferralService {
    pub fn new(phi: Arc<dyn PhiStore>, workflow: Arc<dyn WorkflowStore>) -> Self {
        Self { phi, workflow }
    }

    /// Opens the file-backed PHI collection and the SQLite workflow database named by `cfg`.
    ///
    /// # Errors
    ///
    /// Returns an error if either store cannot be opened.
    pub fn from_config(cfg: &CoreConfig) -> ReferralResult<Self> {
        let phi = FilePhiStore::open(cfg.phi_dir())?;
        let workflow = SqliteWorkflowStore::open(cfg.workflow_db_path())?;
        tracing::info!(
            "opened PHI collection at {} and workflow database at {}",
            phi.root().display(),
            cfg.workflow_db_path().display()
        );
        Ok(Self::new(Arc::new(phi), Arc::new(workflow)))
    }

    // ========================================================================
    // PHI
    // ========================================================================

    /// Validates and stores a standalone PHI document for `owner_id`.
    pub async fn create_phi(&self, payload: PhiPayload, owner_id: &str) -> ReferralResult<PhiRecord> {
        let new = payload.validate(owner_id)?;
        self.phi.insert(new).await
    }

    /// Fetches one PHI document owned by `owner_id`.
    ///
    /// `id` may be in any spelling [`RecordId::normalise`] accepts.
    ///
    /// # Errors
    ///
    /// - [`ReferralError::InvalidInput`] if `id` is not an identifier.
    /// - [`ReferralError::PhiNotFound`] if it does not exist or belongs to someone else.
    pub async fn get_phi(&self, id: &str, owner_id: &str) -> ReferralResult<PhiRecord> {
        let id = RecordId::normalise(id)
            .ok_or_else(|| ReferralError::InvalidInput(format!("malformed PHI id: '{}'", id)))?;

        self.phi
            .get(&id)
            .await?
            .filter(|record| record.owner_id == owner_id)
            .ok_or(ReferralError::PhiNotFound(id))
    }

    pub async fn list_phi(&self, owner_id: &str) -> ReferralResult<Vec<PhiRecord>> {
        self.phi.list_by_owner(owner_id).await
    }

    /// The newest PHI document owned by `owner_id` whose PMI number equals `pmi_number`.
    ///
    /// Surrounding whitespace is ignored on both sides; the comparison is otherwise exact.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralError::InvalidInput`] for a blank PMI number, or the store's error.
    pub async fn find_phi_by_pmi(
        &self,
        pmi_number: &str,
        owner_id: &str,
    ) -> ReferralResult<Option<PhiRecord>> {
        let pmi_number = pmi_number.trim();
        if pmi_number.is_empty() {
            return Err(ReferralError::InvalidInput("PMI number must not be blank".into()));
        }

        let records = self.phi.list_by_owner(owner_id).await?;
        Ok(records
            .into_iter()
            .find(|record| record.pmi_number.trim() == pmi_number))
    }

    // ========================================================================
    // Referrals
    // ========================================================================

    pub async fn submit(
        &self,
        form: &ReferralForm,
        case_manager_id: &str,
    ) -> ReferralResult<SubmittedReferral> {
        submit_referral(self.phi.as_ref(), self.workflow.as_ref(), form, case_manager_id).await
    }

    pub async fn reconciled_referrals(
        &self,
        owner_id: &str,
    ) -> ReferralResult<Vec<ReconciledReferral>> {
        reconciliation::reconcile_for_owner(self.phi.as_ref(), self.workflow.as_ref(), owner_id)
            .await
    }

    pub async fn reconciled_referral(
        &self,
        referral_id: i64,
        owner_id: &str,
    ) -> ReferralResult<ReconciledReferral> {
        reconciliation::reconcile_one(
            self.phi.as_ref(),
            self.workflow.as_ref(),
            referral_id,
            owner_id,
        )
        .await
    }

    /// Pending referrals across all case managers, without any PHI.
    pub async fn open_referrals_for_provider(&self) -> ReferralResult<Vec<ReconciledReferral>> {
        let referrals = self.workflow.list_by_status(ReferralStatus::Pending).await?;
        Ok(referrals
            .into_iter()
            .map(ReconciledReferral::without_phi)
            .collect())
    }

    /// Moves a referral owned by `owner_id` to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralError::ReferralNotFound`] if the referral does not exist or belongs to
    /// someone else.
    pub async fn update_status(
        &self,
        referral_id: i64,
        status: ReferralStatus,
        owner_id: &str,
    ) -> ReferralResult<ReferralRecord> {
        let owned = self
            .workflow
            .get(referral_id)
            .await?
            .is_some_and(|r| r.case_manager_id == owner_id);
        if !owned {
            return Err(ReferralError::ReferralNotFound(referral_id));
        }

        let updated = self
            .workflow
            .update_status(referral_id, status)
            .await?
            .ok_or(ReferralError::ReferralNotFound(referral_id))?;

        tracing::info!("referral {} moved to {}", referral_id, status);
        Ok(updated)
    }

    pub async fn dashboard(
        &self,
        owner_id: &str,
        search: Option<&str>,
        bucket: DashboardBucket,
    ) -> ReferralResult<DashboardView> {
        let items = self.reconciled_referrals(owner_id).await?;
        Ok(build_dashboard(&items, search, bucket))
    }

    // ========================================================================
    // Health
    // ========================================================================

    pub async fn health(&self) -> StoreHealth {
        let (phi, workflow) = tokio::join!(self.phi.ping(), self.workflow.ping());

        if let Err(e) = &phi {
            tracing::error!("PHI store ping failed: {:?}", e);
        }
        if let Err(e) = &workflow {
            tracing::error!("workflow store ping failed: {:?}", e);
        }

        StoreHealth {
            phi_store: phi.is_ok(),
            workflow_store: workflow.is_ok(),
        }
    }
}
