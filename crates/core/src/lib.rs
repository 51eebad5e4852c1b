//! # Referra Core
//!
//! Core business logic for the Referra referral case-management service.
//!
//! Referrals are split across two independently owned stores:
//! - PHI (protected health information) lives in a document collection, keyed by [`RecordId`]
//! - workflow metadata lives in a relational `referrals` table whose rows reference PHI by
//!   `phi_id`
//!
//! This crate contains:
//! - the data model ([`phi`], [`referral`], [`form`])
//! - store traits and their file/SQLite adapters ([`stores`])
//! - the two-store submission flow with compensation ([`submission`])
//! - the read-time join of both stores ([`reconciliation`])
//! - dashboard search and bucketing ([`dashboard`])
//! - [`ReferralService`], the facade the REST layer and CLI hold
//!
//! **No API concerns**: authentication, HTTP servers and response envelopes belong in
//! `api-rest` and `api-shared`.

pub mod config;
pub mod constants;
pub mod dashboard;
pub mod error;
pub mod form;
pub mod phi;
pub mod reconciliation;
pub mod referral;
pub mod service;
pub mod stores;
pub mod submission;

#[cfg(test)]
mod test_support;

pub use config::{namespace_from_env_value, CoreConfig};
pub use dashboard::{DashboardBucket, DashboardView, ReferralCard};
pub use error::{ReferralError, ReferralResult};
pub use form::{FormState, FormStep, ReferralForm};
pub use phi::{PhiPayload, PhiRecord, PhiView};
pub use reconciliation::ReconciledReferral;
pub use referral::{ReferralRecord, ReferralStatus};
pub use referra_types::NonEmptyText;
pub use referra_uuid::RecordId;
pub use service::{ReferralService, StoreHealth};
pub use submission::SubmittedReferral;
