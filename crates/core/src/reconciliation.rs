//! Read-time join of workflow records with their PHI documents.
//!
//! Workflow rows reference PHI through a free-text `phi_id`; nothing enforces that it resolves.
//! Reconciliation therefore treats the PHI side as optional: a row whose reference is malformed,
//! dangling, or unreadable is returned on its own with no PHI fields, never as an error.
//!
//! Both sides of the join are normalised to the canonical [`RecordId`] form before comparison.

use crate::phi::{PhiRecord, PhiView};
use crate::referral::ReferralRecord;
use crate::stores::{PhiStore, WorkflowStore};
use crate::{ReferralError, ReferralResult};
use referra_uuid::RecordId;
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// One workflow record with its matched PHI, if any.
///
/// Serialises as a single flat object: the workflow fields with the PHI view's fields overlaid
/// (PHI wins on key collision). When no PHI matched, only the workflow fields are present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciledReferral {
    pub referral: ReferralRecord,
    pub phi: Option<PhiView>,
}

impl ReconciledReferral {
    pub fn without_phi(referral: ReferralRecord) -> Self {
        Self {
            referral,
            phi: None,
        }
    }

    pub fn has_phi(&self) -> bool {
        self.phi.is_some()
    }

    /// `"<first> <last>"` when PHI matched.
    pub fn client_name(&self) -> Option<String> {
        self.phi.as_ref().map(PhiView::full_name)
    }
}

impl Serialize for ReconciledReferral {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut merged = serde_json::to_value(&self.referral).map_err(S::Error::custom)?;

        if let (Some(phi), serde_json::Value::Object(base)) = (&self.phi, &mut merged) {
            if let serde_json::Value::Object(overlay) =
                serde_json::to_value(phi).map_err(S::Error::custom)?
            {
                base.extend(overlay);
            }
        }

        merged.serialize(serializer)
    }
}

/// Indexes PHI documents by id. The first document seen for an id wins.
pub fn index_phi(records: Vec<PhiRecord>) -> HashMap<RecordId, PhiRecord> {
    let mut index = HashMap::with_capacity(records.len());

    for record in records {
        if index.contains_key(&record.id) {
            tracing::warn!("duplicate PHI id {}, keeping first occurrence", record.id);
            continue;
        }
        index.insert(record.id, record);
    }

    index
}

/// Pairs each workflow record with the PHI document its `phi_id` names.
///
/// Output order follows `referrals`.
pub fn reconcile(
    referrals: Vec<ReferralRecord>,
    phi_records: Vec<PhiRecord>,
) -> Vec<ReconciledReferral> {
    let index = index_phi(phi_records);

    referrals
        .into_iter()
        .map(|referral| {
            let phi = RecordId::normalise(&referral.phi_id)
                .and_then(|id| index.get(&id))
                .map(PhiRecord::view);
            if phi.is_none() {
                tracing::debug!("referral {} has no matching PHI", referral.id);
            }
            ReconciledReferral { referral, phi }
        })
        .collect()
}

/// Reconciled referrals owned by `owner_id`, newest first.
///
/// Both stores are read concurrently.
///
/// # Errors
///
/// Returns the workflow store's error if its read fails. A failed PHI read is logged and
/// yields workflow-only records.
pub async fn reconcile_for_owner(
    phi_store: &dyn PhiStore,
    workflow_store: &dyn WorkflowStore,
    owner_id: &str,
) -> ReferralResult<Vec<ReconciledReferral>> {
    let (referrals, phi_records) = tokio::join!(
        workflow_store.list_by_case_manager(owner_id),
        phi_store.list_by_owner(owner_id),
    );

    let referrals = referrals?;
    let phi_records = phi_records.unwrap_or_else(|e| {
        tracing::warn!("PHI read failed, returning workflow-only referrals: {:?}", e);
        Vec::new()
    });

    Ok(reconcile(referrals, phi_records))
}

/// One reconciled referral, visible only to the case manager who owns it.
///
/// # Errors
///
/// - [`ReferralError::ReferralNotFound`] if the referral does not exist or belongs to someone
///   else.
/// - The workflow store's error if its read fails.
pub async fn reconcile_one(
    phi_store: &dyn PhiStore,
    workflow_store: &dyn WorkflowStore,
    referral_id: i64,
    owner_id: &str,
) -> ReferralResult<ReconciledReferral> {
    let referral = workflow_store
        .get(referral_id)
        .await?
        .filter(|r| r.case_manager_id == owner_id)
        .ok_or(ReferralError::ReferralNotFound(referral_id))?;

    let Some(phi_id) = RecordId::normalise(&referral.phi_id) else {
        return Ok(ReconciledReferral::without_phi(referral));
    };

    let phi = match phi_store.get(&phi_id).await {
        Ok(found) => found
            .filter(|p| p.owner_id == owner_id)
            .map(|p| p.view()),
        Err(e) => {
            tracing::warn!("PHI read failed for referral {}: {:?}", referral_id, e);
            None
        }
    };

    Ok(ReconciledReferral { referral, phi })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referral::ReferralStatus;
    use crate::stores::{FilePhiStore, SqliteWorkflowStore};
    use crate::submission::submit_referral;
    use crate::test_support::{jane_doe_form, FailingPhiStore, FailingWorkflowStore};
    use tempfile::TempDir;

    struct Stores {
        _dir: TempDir,
        phi: FilePhiStore,
        workflow: SqliteWorkflowStore,
    }

    fn stores() -> Stores {
        let dir = TempDir::new().unwrap();
        let phi = FilePhiStore::open(dir.path()).unwrap();
        Stores {
            _dir: dir,
            phi,
            workflow: SqliteWorkflowStore::open_in_memory().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_submission_reconciles_to_one_combined_item() {
        let s = stores();
        let submitted = submit_referral(&s.phi, &s.workflow, &jane_doe_form(), "user-1")
            .await
            .unwrap();

        let items = reconcile_for_owner(&s.phi, &s.workflow, "user-1")
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].referral.id, submitted.referral.id);
        assert_eq!(items[0].client_name().as_deref(), Some("Jane Doe"));

        let json = serde_json::to_value(&items[0]).unwrap();
        assert_eq!(json["waiver_type"], "CADI");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["firstName"], "Jane");
        assert_eq!(json["lastName"], "Doe");
        assert_eq!(json["dateOfBirth"], "1990-01-01");
    }

    #[tokio::test]
    async fn test_dangling_phi_reference_is_returned_without_phi() {
        let s = stores();
        let submitted = submit_referral(&s.phi, &s.workflow, &jane_doe_form(), "user-1")
            .await
            .unwrap();
        s.phi.delete(&submitted.phi.id).await.unwrap();

        let items = reconcile_for_owner(&s.phi, &s.workflow, "user-1")
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert!(!items[0].has_phi());
        let json = serde_json::to_value(&items[0]).unwrap();
        assert!(json.get("firstName").is_none());
        assert!(json.get("insuranceInfo").is_none());
    }

    #[tokio::test]
    async fn test_reconciliation_is_idempotent() {
        let s = stores();
        submit_referral(&s.phi, &s.workflow, &jane_doe_form(), "user-1")
            .await
            .unwrap();
        submit_referral(&s.phi, &s.workflow, &jane_doe_form(), "user-1")
            .await
            .unwrap();

        let first = reconcile_for_owner(&s.phi, &s.workflow, "user-1")
            .await
            .unwrap();
        let second = reconcile_for_owner(&s.phi, &s.workflow, "user-1")
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_phi_read_failure_degrades_to_workflow_only() {
        let s = stores();
        submit_referral(&s.phi, &s.workflow, &jane_doe_form(), "user-1")
            .await
            .unwrap();

        let items = reconcile_for_owner(&FailingPhiStore, &s.workflow, "user-1")
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert!(!items[0].has_phi());
    }

    #[tokio::test]
    async fn test_missing_phi_collection_degrades_to_workflow_only() {
        let s = stores();
        submit_referral(&s.phi, &s.workflow, &jane_doe_form(), "user-1")
            .await
            .unwrap();

        std::fs::remove_dir_all(s.phi.root()).unwrap();
        let items = reconcile_for_owner(&s.phi, &s.workflow, "user-1")
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert!(!items[0].has_phi());
    }

    #[tokio::test]
    async fn test_workflow_read_failure_is_an_error() {
        let s = stores();
        let result = reconcile_for_owner(&s.phi, &FailingWorkflowStore, "user-1").await;
        assert!(matches!(result, Err(ReferralError::Backend(_))));
    }

    #[tokio::test]
    async fn test_phi_id_is_normalised_before_matching() {
        let s = stores();
        let submitted = submit_referral(&s.phi, &s.workflow, &jane_doe_form(), "user-1")
            .await
            .unwrap();

        let mut referral = submitted.referral.clone();
        referral.phi_id = format!(" {} ", submitted.phi.id.uuid().hyphenated()).to_uppercase();

        let items = reconcile(vec![referral], vec![submitted.phi.clone()]);
        assert!(items[0].has_phi());
    }

    #[tokio::test]
    async fn test_duplicate_phi_ids_keep_first_occurrence() {
        let s = stores();
        let submitted = submit_referral(&s.phi, &s.workflow, &jane_doe_form(), "user-1")
            .await
            .unwrap();

        let mut shadow = submitted.phi.clone();
        shadow.first_name = "Shadow".into();

        let index = index_phi(vec![submitted.phi.clone(), shadow]);
        assert_eq!(index.len(), 1);
        assert_eq!(index[&submitted.phi.id].first_name, "Jane");
    }

    #[tokio::test]
    async fn test_reconcile_one_hides_foreign_referrals() {
        let s = stores();
        let submitted = submit_referral(&s.phi, &s.workflow, &jane_doe_form(), "user-1")
            .await
            .unwrap();

        let mine = reconcile_one(&s.phi, &s.workflow, submitted.referral.id, "user-1")
            .await
            .unwrap();
        assert!(mine.has_phi());
        assert_eq!(mine.referral.status, ReferralStatus::Pending);

        let theirs = reconcile_one(&s.phi, &s.workflow, submitted.referral.id, "user-2").await;
        assert!(matches!(theirs, Err(ReferralError::ReferralNotFound(_))));

        let missing = reconcile_one(&s.phi, &s.workflow, 9999, "user-1").await;
        assert!(matches!(missing, Err(ReferralError::ReferralNotFound(9999))));
    }
}
