//! OpenAPI document served at `/api-docs/openapi.json`.

use crate::handlers;
use api_shared::{HealthRes, Role};
use referra_core::dashboard::{BucketCounts, DashboardBucket, DashboardView, ReferralCard};
use referra_core::form::ReferralForm;
use referra_core::phi::{Address, InsuranceInfo, PhiPayload, PhiRecord, PhiView, SafetyInfo, Sex};
use referra_core::referral::{
    PlanType, ReferralRecord, ReferralStatus, ServiceHours, Urgency, WaiverType,
};
use referra_core::submission::SubmittedReferral;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Referra API",
        description = "Referral case management. Responses are wrapped in \
                       `{ success, data | error, message? }`; authenticated routes take \
                       `Authorization: Bearer <token>`."
    ),
    paths(
        handlers::health,
        handlers::create_phi,
        handlers::get_phi,
        handlers::list_phi,
        handlers::list_referrals,
        handlers::submit_referral,
        handlers::get_referral,
        handlers::update_referral_status,
        handlers::dashboard,
    ),
    components(schemas(
        HealthRes,
        Role,
        PhiPayload,
        PhiRecord,
        PhiView,
        Address,
        InsuranceInfo,
        SafetyInfo,
        Sex,
        ReferralForm,
        ReferralRecord,
        ReferralStatus,
        Urgency,
        ServiceHours,
        WaiverType,
        PlanType,
        SubmittedReferral,
        handlers::StatusUpdateReq,
        DashboardView,
        DashboardBucket,
        BucketCounts,
        ReferralCard,
    ))
)]
pub struct ApiDoc;
