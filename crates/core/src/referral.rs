//! Referral workflow records.
//!
//! Workflow records hold the non-sensitive tracking data for a referral and point at their PHI
//! document through `phi_id`. They are serialised in snake_case to match the relational columns.
//!
//! Each enum here has a fixed textual form used both on the wire and in the database, exposed
//! through `as_str` and [`FromStr`].

use crate::{ReferralError, ReferralResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Enumerations
// ============================================================================

macro_rules! text_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ReferralError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(ReferralError::InvalidField {
                        field: $field,
                        reason: format!("unknown value '{}'", other),
                    }),
                }
            }
        }
    };
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

text_enum!(Urgency, "urgency", {
    Low => "Low",
    Medium => "Medium",
    High => "High",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ServiceHours {
    Weekdays,
    Evenings,
    Weekends,
    Flexible,
}

text_enum!(ServiceHours, "serviceHoursPreference", {
    Weekdays => "Weekdays",
    Evenings => "Evenings",
    Weekends => "Weekends",
    Flexible => "Flexible",
});

/// Medicaid waiver program. Serves as the referral's program identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum WaiverType {
    #[serde(rename = "CADI")]
    Cadi,
    #[serde(rename = "DD")]
    Dd,
    #[serde(rename = "EW")]
    Ew,
    #[serde(rename = "CAC")]
    Cac,
    #[serde(rename = "BI")]
    Bi,
}

text_enum!(WaiverType, "waiverType", {
    Cadi => "CADI",
    Dd => "DD",
    Ew => "EW",
    Cac => "CAC",
    Bi => "BI",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum PlanType {
    #[serde(rename = "CSSP")]
    Cssp,
    #[serde(rename = "CCP")]
    Ccp,
    #[serde(rename = "HFPCP")]
    Hfpcp,
}

text_enum!(PlanType, "planType", {
    Cssp => "CSSP",
    Ccp => "CCP",
    Hfpcp => "HFPCP",
});

/// Referral lifecycle status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum ReferralStatus {
    #[default]
    Pending,
    InProgress,
    Matched,
    Completed,
    Cancelled,
}

text_enum!(ReferralStatus, "status", {
    Pending => "pending",
    InProgress => "in-progress",
    Matched => "matched",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl ReferralStatus {
    /// Human-readable label shown on dashboard cards.
    pub fn display_label(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "Pending Matches",
            ReferralStatus::InProgress => "In Progress",
            ReferralStatus::Matched => "Matched",
            ReferralStatus::Completed => "Completed",
            ReferralStatus::Cancelled => "Cancelled",
        }
    }

    /// True for referrals a provider is actively working on.
    pub fn is_active(&self) -> bool {
        matches!(self, ReferralStatus::InProgress | ReferralStatus::Matched)
    }
}

// ============================================================================
// Records
// ============================================================================

/// A stored referral workflow row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReferralRecord {
    pub id: i64,
    pub case_manager_id: String,
    /// Foreign reference to the PHI document, kept as the text that was stored.
    pub phi_id: String,
    pub service_type: String,
    pub urgency: Urgency,
    pub preferred_start_date: Option<NaiveDate>,
    pub counties: Vec<String>,
    pub service_hours_preference: Vec<ServiceHours>,
    pub emergency_services_needed: bool,
    pub waiver_type: WaiverType,
    pub plan_type: Option<PlanType>,
    pub status: ReferralStatus,
    pub additional_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReferralRecord {
    /// Display identifier, e.g. `REF-0007`.
    pub fn formatted_id(&self) -> String {
        format!("REF-{:04}", self.id)
    }
}

/// Everything needed to insert a workflow row. The store assigns `id` and timestamps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReferral {
    pub case_manager_id: String,
    pub phi_id: String,
    pub service_type: String,
    pub urgency: Urgency,
    pub preferred_start_date: Option<NaiveDate>,
    pub counties: Vec<String>,
    pub service_hours_preference: Vec<ServiceHours>,
    pub emergency_services_needed: bool,
    pub waiver_type: WaiverType,
    pub plan_type: Option<PlanType>,
    pub status: ReferralStatus,
    pub additional_notes: Option<String>,
}

impl NewReferral {
    /// Checks the fields the relational table cannot represent.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralError::InvalidField`] when `case_manager_id` or `phi_id` is blank.
    pub fn validate(&self) -> ReferralResult<()> {
        if self.case_manager_id.trim().is_empty() {
            return Err(ReferralError::InvalidField {
                field: "case_manager_id",
                reason: "must not be empty".into(),
            });
        }
        if self.phi_id.trim().is_empty() {
            return Err(ReferralError::InvalidField {
                field: "phi_id",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}
