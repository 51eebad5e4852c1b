//! Fixtures and store doubles shared by unit tests.

use crate::form::ReferralForm;
use crate::phi::{Address, NewPhiRecord, PhiRecord};
use crate::referral::{NewReferral, PlanType, ReferralRecord, ReferralStatus, Urgency, WaiverType};
use crate::stores::{FilePhiStore, PhiStore, WorkflowStore};
use crate::{ReferralError, ReferralResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use referra_uuid::RecordId;
use std::io;

/// The "Jane Doe, 1990-01-01, CADI" referral used across tests.
pub(crate) fn jane_doe_form() -> ReferralForm {
    ReferralForm {
        service_type: Some("Individualized Home Supports".into()),
        urgency: Some(Urgency::High),
        preferred_start_date: NaiveDate::from_ymd_opt(2026, 11, 1),
        counties: vec!["Hennepin".into()],
        first_name: Some("Jane".into()),
        last_name: Some("Doe".into()),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
        pmi_number: Some("PMI-0001".into()),
        address: Address {
            street: "1 Main St".into(),
            city: "Minneapolis".into(),
            state: "MN".into(),
            zip_code: "55401".into(),
        },
        waiver_type: Some(WaiverType::Cadi),
        plan_type: Some(PlanType::Cssp),
        ..Default::default()
    }
}

fn unavailable() -> ReferralError {
    ReferralError::Backend("store unavailable".into())
}

/// Workflow store whose every operation fails.
pub(crate) struct FailingWorkflowStore;

#[async_trait]
impl WorkflowStore for FailingWorkflowStore {
    async fn insert(&self, _new: NewReferral) -> ReferralResult<ReferralRecord> {
        Err(unavailable())
    }

    async fn get(&self, _id: i64) -> ReferralResult<Option<ReferralRecord>> {
        Err(unavailable())
    }

    async fn list_by_case_manager(&self, _id: &str) -> ReferralResult<Vec<ReferralRecord>> {
        Err(unavailable())
    }

    async fn list_by_status(&self, _status: ReferralStatus) -> ReferralResult<Vec<ReferralRecord>> {
        Err(unavailable())
    }

    async fn update_status(
        &self,
        _id: i64,
        _status: ReferralStatus,
    ) -> ReferralResult<Option<ReferralRecord>> {
        Err(unavailable())
    }

    async fn ping(&self) -> ReferralResult<()> {
        Err(unavailable())
    }
}

/// PHI store whose every operation fails.
pub(crate) struct FailingPhiStore;

#[async_trait]
impl PhiStore for FailingPhiStore {
    async fn insert(&self, _new: NewPhiRecord) -> ReferralResult<PhiRecord> {
        Err(unavailable())
    }

    async fn get(&self, _id: &RecordId) -> ReferralResult<Option<PhiRecord>> {
        Err(unavailable())
    }

    async fn list_by_owner(&self, _owner_id: &str) -> ReferralResult<Vec<PhiRecord>> {
        Err(unavailable())
    }

    async fn delete(&self, _id: &RecordId) -> ReferralResult<bool> {
        Err(unavailable())
    }

    async fn ping(&self) -> ReferralResult<()> {
        Err(unavailable())
    }
}

/// Real file store that refuses to delete.
pub(crate) struct BrokenDeletePhiStore {
    inner: FilePhiStore,
}

impl BrokenDeletePhiStore {
    pub(crate) fn new(inner: FilePhiStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl PhiStore for BrokenDeletePhiStore {
    async fn insert(&self, new: NewPhiRecord) -> ReferralResult<PhiRecord> {
        self.inner.insert(new).await
    }

    async fn get(&self, id: &RecordId) -> ReferralResult<Option<PhiRecord>> {
        self.inner.get(id).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> ReferralResult<Vec<PhiRecord>> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn delete(&self, _id: &RecordId) -> ReferralResult<bool> {
        Err(ReferralError::FileRemove(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "read-only collection",
        )))
    }

    async fn ping(&self) -> ReferralResult<()> {
        self.inner.ping().await
    }
}
