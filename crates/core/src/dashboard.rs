//! Dashboard projection of reconciled referrals.
//!
//! Pure functions over an already reconciled list: search, bucket, count and project to cards.
//! Nothing here touches a store.

use crate::reconciliation::ReconciledReferral;
use crate::referral::{ReferralStatus, Urgency};
use crate::ReferralError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Dashboard tab.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum DashboardBucket {
    #[default]
    All,
    /// `status == pending`
    Pending,
    /// `status` is `in-progress` or `matched`
    Active,
    /// `urgency == High`
    Urgent,
}

impl DashboardBucket {
    pub fn contains(self, item: &ReconciledReferral) -> bool {
        let referral = &item.referral;
        match self {
            DashboardBucket::All => true,
            DashboardBucket::Pending => referral.status == ReferralStatus::Pending,
            DashboardBucket::Active => referral.status.is_active(),
            DashboardBucket::Urgent => referral.urgency == Urgency::High,
        }
    }
}

impl FromStr for DashboardBucket {
    type Err = ReferralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(DashboardBucket::All),
            "pending" => Ok(DashboardBucket::Pending),
            "active" => Ok(DashboardBucket::Active),
            "urgent" => Ok(DashboardBucket::Urgent),
            other => Err(ReferralError::InvalidField {
                field: "bucket",
                reason: format!("unknown bucket '{}'", other),
            }),
        }
    }
}

/// Case-insensitive substring match over id, client name, service type, waiver and plan.
///
/// A blank query matches everything.
pub fn matches_search(item: &ReconciledReferral, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }

    let referral = &item.referral;
    let haystacks = [
        Some(referral.id.to_string()),
        Some(referral.formatted_id().to_lowercase()),
        item.client_name().map(|n| n.to_lowercase()),
        Some(referral.service_type.to_lowercase()),
        Some(referral.waiver_type.as_str().to_lowercase()),
        referral.plan_type.map(|p| p.as_str().to_lowercase()),
    ];

    haystacks
        .iter()
        .flatten()
        .any(|haystack| haystack.contains(&query))
}

/// A referral as shown in a dashboard list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ReferralCard {
    pub id: i64,
    pub formatted_id: String,
    pub service_label: String,
    pub status: ReferralStatus,
    pub display_status: String,
    pub category: String,
    pub client_name: Option<String>,
    pub is_urgent: bool,
    pub emergency_services_needed: bool,
    pub counties: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ReconciledReferral> for ReferralCard {
    fn from(item: &ReconciledReferral) -> Self {
        let referral = &item.referral;
        let service_label = if referral.service_type.trim().is_empty() {
            "General Service".to_owned()
        } else {
            referral.service_type.clone()
        };

        Self {
            id: referral.id,
            formatted_id: referral.formatted_id(),
            service_label,
            status: referral.status,
            display_status: referral.status.display_label().to_owned(),
            // Waiver type is always present on stored rows.
            category: referral.waiver_type.as_str().to_owned(),
            client_name: item.client_name(),
            is_urgent: referral.urgency == Urgency::High,
            emergency_services_needed: referral.emergency_services_needed,
            counties: referral.counties.clone(),
            created_at: referral.created_at,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BucketCounts {
    pub all: usize,
    pub pending: usize,
    pub active: usize,
    pub urgent: usize,
}

/// Cards for the selected bucket plus per-bucket counts, all after search filtering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DashboardView {
    pub bucket: DashboardBucket,
    pub search: Option<String>,
    pub counts: BucketCounts,
    pub cards: Vec<ReferralCard>,
}

/// Builds the dashboard for `items`.
///
/// Counts reflect the search filter, so tab badges agree with what each tab would list.
pub fn build_dashboard(
    items: &[ReconciledReferral],
    search: Option<&str>,
    bucket: DashboardBucket,
) -> DashboardView {
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let matched: Vec<&ReconciledReferral> = items
        .iter()
        .filter(|item| search.map_or(true, |q| matches_search(item, q)))
        .collect();

    let count = |b: DashboardBucket| matched.iter().filter(|item| b.contains(item)).count();
    let counts = BucketCounts {
        all: matched.len(),
        pending: count(DashboardBucket::Pending),
        active: count(DashboardBucket::Active),
        urgent: count(DashboardBucket::Urgent),
    };

    let cards = matched
        .iter()
        .filter(|item| bucket.contains(item))
        .map(|item| ReferralCard::from(*item))
        .collect();

    DashboardView {
        bucket,
        search: search.map(str::to_owned),
        counts,
        cards,
    }
}
