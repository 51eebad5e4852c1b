//! Referral submission.
//!
//! A submission writes to two stores that share no transaction:
//!
//! 1. the form is validated (nothing is written if anything required is missing),
//! 2. the PHI subset is written to the document collection,
//! 3. the workflow subset is written to the relational store with `phi_id` set to the new
//!    document's id.
//!
//! If step 3 fails the PHI document from step 2 is deleted again so no unreferenced PHI is left
//! behind. A failed deletion is surfaced as [`ReferralError::CompensationFailed`], which names
//! the orphaned document.

use crate::form::ReferralForm;
use crate::phi::PhiRecord;
use crate::referral::ReferralRecord;
use crate::stores::{PhiStore, WorkflowStore};
use crate::{ReferralError, ReferralResult};
use referra_uuid::RecordId;
use serde::Serialize;

/// The two records created by a successful submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubmittedReferral {
    pub phi: PhiRecord,
    pub referral: ReferralRecord,
}

/// Validates `form` and writes its PHI and workflow subsets on behalf of `case_manager_id`.
///
/// # Errors
///
/// - [`ReferralError::MissingRequiredFields`] / [`ReferralError::InvalidField`] before any write.
/// - Any PHI store error, in which case nothing was written.
/// - The workflow store error, after the PHI document has been removed again.
/// - [`ReferralError::CompensationFailed`] if the workflow write and the PHI removal both fail.
pub async fn submit_referral(
    phi_store: &dyn PhiStore,
    workflow_store: &dyn WorkflowStore,
    form: &ReferralForm,
    case_manager_id: &str,
) -> ReferralResult<SubmittedReferral> {
    form.validate()?;
    let new_phi = form.phi_subset(case_manager_id)?;

    let phi = phi_store.insert(new_phi).await?;

    let written = match form.workflow_subset(case_manager_id, &phi.id) {
        Ok(new_referral) => workflow_store.insert(new_referral).await,
        Err(e) => Err(e),
    };

    match written {
        Ok(referral) => {
            tracing::info!(
                "submitted referral {} referencing PHI {}",
                referral.id,
                phi.id
            );
            Ok(SubmittedReferral { phi, referral })
        }
        Err(write_error) => Err(compensate(phi_store, phi.id, write_error).await),
    }
}

/// Removes the PHI document written by a submission whose workflow write failed.
///
/// Always returns the error to hand back to the caller.
async fn compensate(
    phi_store: &dyn PhiStore,
    phi_id: RecordId,
    write_error: ReferralError,
) -> ReferralError {
    tracing::warn!(
        "workflow write failed, removing PHI {}: {:?}",
        phi_id,
        write_error
    );

    match phi_store.delete(&phi_id).await {
        Ok(_) => write_error,
        Err(cleanup_error) => {
            tracing::error!(
                "PHI compensation failed, orphaned PHI {}: {:?}",
                phi_id,
                cleanup_error
            );
            ReferralError::CompensationFailed {
                phi_id,
                write_error: Box::new(write_error),
                cleanup_error: Box::new(cleanup_error),
            }
        }
    }
}
