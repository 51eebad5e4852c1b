//! The multi-step referral form.
//!
//! A referral is captured over four steps and submitted as one [`ReferralForm`] payload that
//! carries both PHI and workflow fields. The payload is split into its two subsets on
//! submission; see [`crate::submission`].
//!
//! Two levels of validation exist:
//!
//! - per-step checks ([`FormStep::missing_fields`]) drive [`FormState`] navigation, and
//! - the fixed submission set ([`ReferralForm::missing_required_fields`]) is what the server
//!   enforces before writing anything.

use crate::constants::REQUIRED_SUBMISSION_FIELDS;
use crate::phi::{is_blank, optional_text, Address, NewPhiRecord, PhiPayload, SafetyInfo, Sex};
use crate::referral::{NewReferral, PlanType, ReferralStatus, ServiceHours, Urgency, WaiverType};
use crate::{ReferralError, ReferralResult};
use chrono::NaiveDate;
use referra_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// Complete referral form payload as posted to `POST /referrals`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct ReferralForm {
    // Step 1: service request
    pub service_type: Option<String>,
    pub urgency: Option<Urgency>,
    pub preferred_start_date: Option<NaiveDate>,
    pub counties: Vec<String>,
    pub service_hours_preference: Vec<ServiceHours>,
    pub emergency_services_needed: bool,

    // Step 2: client information
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

    // Step 3: program and safety
    pub waiver_type: Option<WaiverType>,
    pub plan_type: Option<PlanType>,
    pub safety_info: SafetyInfo,
    pub medical_notes: Option<String>,
    pub additional_notes: Option<String>,
}

impl ReferralForm {
    /// Fields of the fixed submission set that are absent or blank, in wire-name order.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        REQUIRED_SUBMISSION_FIELDS
            .into_iter()
            .filter(|field| self.is_field_missing(field))
            .collect()
    }

    /// Runs the server-side submission checks without writing anything.
    ///
    /// # Errors
    ///
    /// - [`ReferralError::MissingRequiredFields`] naming every missing field of the submission
    ///   set.
    /// - [`ReferralError::InvalidField`] if a supplied email or phone number is malformed.
    pub fn validate(&self) -> ReferralResult<()> {
        let missing = self.missing_required_fields();
        if !missing.is_empty() {
            return Err(ReferralError::MissingRequiredFields(missing));
        }
        self.phi_payload().validate("validation")?;
        Ok(())
    }

    /// The PHI subset of the form, validated and owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Same as [`PhiPayload::validate`].
    pub fn phi_subset(&self, owner_id: &str) -> ReferralResult<NewPhiRecord> {
        self.phi_payload().validate(owner_id)
    }

    /// The workflow subset of the form, referencing `phi_id` and owned by `case_manager_id`.
    ///
    /// New referrals always start as [`ReferralStatus::Pending`]. Urgency defaults to `Medium`.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralError::MissingRequiredFields`] if `waiverType` is absent.
    pub fn workflow_subset(
        &self,
        case_manager_id: &str,
        phi_id: &RecordId,
    ) -> ReferralResult<NewReferral> {
        let waiver_type = self
            .waiver_type
            .ok_or(ReferralError::MissingRequiredFields(vec!["waiverType"]))?;

        let new = NewReferral {
            case_manager_id: case_manager_id.to_owned(),
            phi_id: phi_id.to_string(),
            service_type: optional_text(self.service_type.clone()).unwrap_or_default(),
            urgency: self.urgency.unwrap_or_default(),
            preferred_start_date: self.preferred_start_date,
            counties: self
                .counties
                .iter()
                .map(|c| c.trim().to_owned())
                .filter(|c| !c.is_empty())
                .collect(),
            service_hours_preference: self.service_hours_preference.clone(),
            emergency_services_needed: self.emergency_services_needed,
            waiver_type,
            plan_type: self.plan_type,
            status: ReferralStatus::Pending,
            additional_notes: optional_text(self.additional_notes.clone()),
        };
        new.validate()?;
        Ok(new)
    }

    fn phi_payload(&self) -> PhiPayload {
        PhiPayload {
            first_name: self.first_name.clone(),
            middle_name: self.middle_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: self.date_of_birth,
            sex: self.sex,
            pmi_number: self.pmi_number.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            insurance_provider: self.insurance_provider.clone(),
            insurance_id: self.insurance_id.clone(),
            safety_info: self.safety_info.clone(),
            medical_notes: self.medical_notes.clone(),
        }
    }

    fn is_field_missing(&self, field: &str) -> bool {
        match field {
            "serviceType" => is_blank(&self.service_type),
            "preferredStartDate" => self.preferred_start_date.is_none(),
            "counties" => self.counties.iter().all(|c| c.trim().is_empty()),
            "firstName" => is_blank(&self.first_name),
            "lastName" => is_blank(&self.last_name),
            "dateOfBirth" => self.date_of_birth.is_none(),
            "pmiNumber" => is_blank(&self.pmi_number),
            "street" => self.address.street.trim().is_empty(),
            "city" => self.address.city.trim().is_empty(),
            "state" => self.address.state.trim().is_empty(),
            "zipCode" => self.address.zip_code.trim().is_empty(),
            "waiverType" => self.waiver_type.is_none(),
            "planType" => self.plan_type.is_none(),
            _ => false,
        }
    }
}

// ============================================================================
// Steps
// ============================================================================

/// One page of the referral form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormStep {
    ServiceRequest,
    ClientInformation,
    ProgramAndSafety,
    Review,
}

const SERVICE_REQUEST_FIELDS: &[&str] = &["serviceType", "preferredStartDate", "counties"];
const CLIENT_INFORMATION_FIELDS: &[&str] = &[
    "firstName",
    "lastName",
    "dateOfBirth",
    "pmiNumber",
    "street",
    "city",
    "state",
    "zipCode",
];
const PROGRAM_AND_SAFETY_FIELDS: &[&str] = &["waiverType", "planType"];

impl FormStep {
    pub const COUNT: u8 = 4;

    /// 1-based position of the step.
    pub fn number(self) -> u8 {
        match self {
            FormStep::ServiceRequest => 1,
            FormStep::ClientInformation => 2,
            FormStep::ProgramAndSafety => 3,
            FormStep::Review => 4,
        }
    }

    /// Step at a 1-based position, or `None` outside `1..=4`.
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(FormStep::ServiceRequest),
            2 => Some(FormStep::ClientInformation),
            3 => Some(FormStep::ProgramAndSafety),
            4 => Some(FormStep::Review),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            FormStep::ServiceRequest => "Service Request",
            FormStep::ClientInformation => "Client Information",
            FormStep::ProgramAndSafety => "Program & Safety",
            FormStep::Review => "Review",
        }
    }

    /// Wire names of the fields this step requires. `Review` requires every earlier step.
    pub fn required_fields(self) -> Vec<&'static str> {
        match self {
            FormStep::ServiceRequest => SERVICE_REQUEST_FIELDS.to_vec(),
            FormStep::ClientInformation => CLIENT_INFORMATION_FIELDS.to_vec(),
            FormStep::ProgramAndSafety => PROGRAM_AND_SAFETY_FIELDS.to_vec(),
            FormStep::Review => [
                SERVICE_REQUEST_FIELDS,
                CLIENT_INFORMATION_FIELDS,
                PROGRAM_AND_SAFETY_FIELDS,
            ]
            .concat(),
        }
    }

    /// Required fields of this step that `form` does not yet satisfy.
    pub fn missing_fields(self, form: &ReferralForm) -> Vec<&'static str> {
        self.required_fields()
            .into_iter()
            .filter(|field| form.is_field_missing(field))
            .collect()
    }
}

/// In-progress form with its current step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormState {
    step: Option<FormStep>,
    form: ReferralForm,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> FormStep {
        self.step.unwrap_or(FormStep::ServiceRequest)
    }

    pub fn form(&self) -> &ReferralForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut ReferralForm {
        &mut self.form
    }

    /// Advances one step. Staying on `Review` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralError::MissingRequiredFields`] if the current step is incomplete; the
    /// step is left unchanged.
    pub fn next_step(&mut self) -> ReferralResult<FormStep> {
        let current = self.step();
        let missing = current.missing_fields(&self.form);
        if !missing.is_empty() {
            return Err(ReferralError::MissingRequiredFields(missing));
        }

        let next = FormStep::from_number(current.number() + 1).unwrap_or(current);
        self.step = Some(next);
        Ok(next)
    }

    /// Goes back one step, stopping at the first.
    pub fn prev_step(&mut self) -> FormStep {
        let current = self.step();
        let prev = FormStep::from_number(current.number().saturating_sub(1)).unwrap_or(current);
        self.step = Some(prev);
        prev
    }

    /// Completion of the current step as a whole percentage.
    pub fn progress_percent(&self) -> u8 {
        let percent = u16::from(self.step().number()) * 100 / u16::from(FormStep::COUNT);
        u8::try_from(percent).unwrap_or(100)
    }

    /// Adds `county` if it is not selected, otherwise removes it.
    pub fn toggle_county(&mut self, county: &str) {
        let county = county.trim();
        if county.is_empty() {
            return;
        }
        if let Some(pos) = self.form.counties.iter().position(|c| c == county) {
            self.form.counties.remove(pos);
        } else {
            self.form.counties.push(county.to_owned());
        }
    }

    /// Checks or unchecks one service-hours option, keeping the list free of duplicates.
    pub fn set_service_hours(&mut self, hours: ServiceHours, checked: bool) {
        let selected = &mut self.form.service_hours_preference;
        if checked {
            if !selected.contains(&hours) {
                selected.push(hours);
            }
        } else {
            selected.retain(|h| *h != hours);
        }
    }

    /// Finishes the form.
    ///
    /// # Errors
    ///
    /// Returns [`ReferralError::MissingRequiredFields`] listing everything the review step still
    /// requires.
    pub fn into_form(self) -> ReferralResult<ReferralForm> {
        let missing = FormStep::Review.missing_fields(&self.form);
        if !missing.is_empty() {
            return Err(ReferralError::MissingRequiredFields(missing));
        }
        Ok(self.form)
    }
}
