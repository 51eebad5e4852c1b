//! Protected health information (PHI) records.
//!
//! PHI is owned by the document store and serialised in camelCase, matching the document
//! collection's field naming. Three shapes exist:
//!
//! - [`PhiPayload`]: loosely typed input accepted from `POST /phi`, validated into
//! - [`NewPhiRecord`]: everything the store needs to create a document, and
//! - [`PhiRecord`]: a stored document with its identifier and timestamps.
//!
//! [`PhiView`] is the client-facing projection merged into reconciled referrals. It leaves out
//! the owner reference and bookkeeping timestamps.

use crate::constants::REQUIRED_PHI_FIELDS;
use crate::{ReferralError, ReferralResult};
use chrono::{DateTime, NaiveDate, Utc};
use referra_types::{EmailAddress, PhoneNumber};
use referra_uuid::RecordId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl Address {
    /// Joins the non-empty parts with `", "`, or `None` when every part is blank.
    pub fn one_line(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.street, &self.city, &self.state, &self.zip_code]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Safety flags recorded for the people who will visit the client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct SafetyInfo {
    pub has_history_of_violence: bool,
    pub violence_notes: Option<String>,
    pub is_sex_offender: bool,
    pub sex_offender_notes: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct InsuranceInfo {
    pub provider: Option<String>,
    pub policy_number: Option<String>,
}

/// A stored PHI document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PhiRecord {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub id: RecordId,
    /// User id of the case manager who owns this record.
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub sex: Option<Sex>,
    pub pmi_number: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub insurance_provider: Option<String>,
    #[serde(default)]
    pub insurance_id: Option<String>,
    #[serde(default)]
    pub safety_info: SafetyInfo,
    #[serde(default)]
    pub medical_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PhiRecord {
    /// Builds a stored record from validated input.
    pub fn from_new(id: RecordId, new: NewPhiRecord, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id: new.owner_id,
            first_name: new.first_name,
            middle_name: new.middle_name,
            last_name: new.last_name,
            date_of_birth: new.date_of_birth,
            sex: new.sex,
            pmi_number: new.pmi_number,
            email: new.email,
            phone: new.phone,
            address: new.address,
            insurance_provider: new.insurance_provider,
            insurance_id: new.insurance_id,
            safety_info: new.safety_info,
            medical_notes: new.medical_notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// `"<first> <last>"`.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Projects the record into the client-facing view.
    pub fn view(&self) -> PhiView {
        PhiView {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: self.date_of_birth,
            sex: self.sex,
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            insurance_info: InsuranceInfo {
                provider: self.insurance_provider.clone(),
                policy_number: self.insurance_id.clone(),
            },
            safety_info: self.safety_info.clone(),
            medical_notes: self.medical_notes.clone(),
        }
    }
}

/// The PHI fields exposed to dashboards and merged into reconciled referrals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PhiView {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub sex: Option<Sex>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub insurance_info: InsuranceInfo,
    pub safety_info: SafetyInfo,
    pub medical_notes: Option<String>,
}

impl PhiView {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Validated input for creating a PHI document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPhiRecord {
    pub owner_id: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub sex: Option<Sex>,
    pub pmi_number: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub insurance_provider: Option<String>,
    pub insurance_id: Option<String>,
    pub safety_info: SafetyInfo,
    pub medical_notes: Option<String>,
}

/// Unvalidated PHI input as posted by clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct PhiPayload {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub pmi_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub insurance_provider: Option<String>,
    pub insurance_id: Option<String>,
    pub safety_info: SafetyInfo,
    pub medical_notes: Option<String>,
}

impl PhiPayload {
    /// Lists required fields that are absent or blank, in declaration order.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        REQUIRED_PHI_FIELDS
            .into_iter()
            .filter(|field| match *field {
                "firstName" => is_blank(&self.first_name),
                "lastName" => is_blank(&self.last_name),
                "dateOfBirth" => self.date_of_birth.is_none(),
                "pmiNumber" => is_blank(&self.pmi_number),
                _ => false,
            })
            .collect()
    }

    /// Validates the payload and attaches the owning user.
    ///
    /// # Errors
    ///
    /// - [`ReferralError::MissingRequiredFields`] if any of `firstName`, `lastName`,
    ///   `dateOfBirth` or `pmiNumber` is absent or blank.
    /// - [`ReferralError::InvalidField`] if a non-blank email or phone is malformed.
    pub fn validate(self, owner_id: &str) -> ReferralResult<NewPhiRecord> {
        let missing = self.missing_required_fields();
        if !missing.is_empty() {
            return Err(ReferralError::MissingRequiredFields(missing));
        }

        let email = optional_text(self.email)
            .map(|raw| {
                EmailAddress::parse(&raw)
                    .map(|e| e.as_str().to_owned())
                    .map_err(|e| ReferralError::InvalidField {
                        field: "email",
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        let phone = optional_text(self.phone)
            .map(|raw| {
                PhoneNumber::parse(&raw)
                    .map(|p| p.as_str().to_owned())
                    .map_err(|e| ReferralError::InvalidField {
                        field: "phone",
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        Ok(NewPhiRecord {
            owner_id: owner_id.to_owned(),
            first_name: required_text(self.first_name),
            middle_name: optional_text(self.middle_name),
            last_name: required_text(self.last_name),
            // Presence checked above.
            date_of_birth: self.date_of_birth.unwrap_or_default(),
            sex: self.sex,
            pmi_number: required_text(self.pmi_number),
            email,
            phone,
            address: self.address,
            insurance_provider: optional_text(self.insurance_provider),
            insurance_id: optional_text(self.insurance_id),
            safety_info: self.safety_info,
            medical_notes: optional_text(self.medical_notes),
        })
    }
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn required_text(value: Option<String>) -> String {
    optional_text(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> PhiPayload {
        PhiPayload {
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
            pmi_number: Some("PMI-0001".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_accepts_minimal_payload() {
        let new = jane().validate("user-1").unwrap();

        assert_eq!(new.owner_id, "user-1");
        assert_eq!(new.first_name, "Jane");
        assert_eq!(new.date_of_birth, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
        assert_eq!(new.email, None);
    }

    #[test]
    fn test_validate_lists_every_missing_field() {
        let payload = PhiPayload {
            first_name: Some("  ".into()),
            ..Default::default()
        };

        match payload.validate("user-1") {
            Err(ReferralError::MissingRequiredFields(fields)) => {
                assert_eq!(
                    fields,
                    vec!["firstName", "lastName", "dateOfBirth", "pmiNumber"]
                );
            }
            other => panic!("expected MissingRequiredFields, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_email() {
        let payload = PhiPayload {
            email: Some("jane.doe".into()),
            ..jane()
        };

        assert!(matches!(
            payload.validate("user-1"),
            Err(ReferralError::InvalidField { field: "email", .. })
        ));
    }

    #[test]
    fn test_validate_normalises_email_and_trims_text() {
        let payload = PhiPayload {
            first_name: Some(" Jane ".into()),
            email: Some("Jane@Example.com".into()),
            medical_notes: Some("   ".into()),
            ..jane()
        };

        let new = payload.validate("user-1").unwrap();
        assert_eq!(new.first_name, "Jane");
        assert_eq!(new.email.as_deref(), Some("jane@example.com"));
        assert_eq!(new.medical_notes, None);
    }

    #[test]
    fn test_record_serialises_camel_case_with_user_id() {
        let new = jane().validate("user-1").unwrap();
        let record = PhiRecord::from_new(RecordId::new(), new, Utc::now());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["firstName"], "Jane");
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["dateOfBirth"], "1990-01-01");
        assert!(json.get("owner_id").is_none());
    }

    #[test]
    fn test_view_groups_insurance_fields() {
        let mut new = jane().validate("user-1").unwrap();
        new.insurance_provider = Some("Medica".into());
        new.insurance_id = Some("MED-42".into());
        let record = PhiRecord::from_new(RecordId::new(), new, Utc::now());

        let view = record.view();
        assert_eq!(view.insurance_info.provider.as_deref(), Some("Medica"));
        assert_eq!(view.insurance_info.policy_number.as_deref(), Some("MED-42"));
        assert_eq!(view.full_name(), "Jane Doe");
    }

    #[test]
    fn test_address_one_line_skips_blank_parts() {
        let address = Address {
            street: "1 Main St".into(),
            city: "".into(),
            state: "MN".into(),
            zip_code: "55401".into(),
        };
        assert_eq!(address.one_line().as_deref(), Some("1 Main St, MN, 55401"));
        assert_eq!(Address::default().one_line(), None);
    }
}
