//! HTTP handlers.
//!
//! Handlers authenticate the caller, check role and ownership, then delegate to
//! [`referra_core::ReferralService`]. Every response body uses the [`ApiResponse`] envelope.

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;
use api_shared::{ApiResponse, HealthRes, HealthService, Role};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use referra_core::reconciliation::ReconciledReferral;
use referra_core::referral::{ReferralRecord, ReferralStatus};
use referra_core::{
    DashboardBucket, DashboardView, PhiPayload, PhiRecord, ReferralForm, SubmittedReferral,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Case manager whose records are requested; must be the caller.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PhiListQuery {
    /// Case manager whose records are requested; must be the caller.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    /// Restricts the listing to the record with this PMI number.
    #[serde(rename = "pmiNumber")]
    pub pmi_number: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DashboardQuery {
    /// Case-insensitive search over id, client name, service, waiver and plan.
    pub search: Option<String>,
    /// One of `all`, `pending`, `active`, `urgent` (default `all`).
    pub bucket: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdateReq {
    pub status: ReferralStatus,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn parse_referral_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("malformed referral id: '{}'", raw)))
}

fn required_user_id(query: UserQuery) -> Result<String, ApiError> {
    query
        .user_id
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing required query parameter: userId".into()))
}

// ============================================================================
// Health
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "All stores reachable", body = HealthRes),
        (status = 503, description = "At least one store unreachable", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Pings both stores and reports per-store reachability together with the deployment
/// namespace. No authentication is required.
///
/// # Returns
/// * `200` with `ok: true` when both stores answer
/// * `503` with `ok: false` otherwise
#[axum::debug_handler]
pub async fn health(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthRes>>) {
    let stores = state.service.health().await;
    let res = HealthService::check_health(
        &state.namespace,
        [
            ("phi", stores.phi_store),
            ("workflow", stores.workflow_store),
        ],
    );

    let status = if res.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ApiResponse::ok(res)))
}

// ============================================================================
// PHI
// ============================================================================

#[utoipa::path(
    post,
    path = "/phi",
    request_body = PhiPayload,
    responses(
        (status = 201, description = "PHI record created", body = PhiRecord),
        (status = 400, description = "Missing or malformed fields"),
        (status = 401, description = "Missing or unknown bearer token"),
        (status = 403, description = "Caller is not a case manager"),
        (status = 500, description = "Internal server error")
    )
)]
/// Create a PHI record owned by the caller
///
/// # Errors
/// Returns `400 Bad Request` listing every missing required field
/// (`firstName`, `lastName`, `dateOfBirth`, `pmiNumber`).
#[axum::debug_handler]
pub async fn create_phi(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<PhiPayload>, JsonRejection>,
) -> CreatedResult<PhiRecord> {
    caller.require_role(Role::CaseManager)?;
    let payload = json_body(payload)?;

    let record = state.service.create_phi(payload, caller.id()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(record))))
}

#[utoipa::path(
    get,
    path = "/phi/{id}",
    params(("id" = String, Path, description = "PHI record id (hyphens and case are ignored)")),
    responses(
        (status = 200, description = "PHI record", body = PhiRecord),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Missing or unknown bearer token"),
        (status = 403, description = "Caller is not a case manager"),
        (status = 404, description = "No such record for this caller"),
        (status = 500, description = "Internal server error")
    )
)]
/// Fetch one PHI record owned by the caller
#[axum::debug_handler]
pub async fn get_phi(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<PhiRecord> {
    caller.require_role(Role::CaseManager)?;
    let record = state.service.get_phi(&id, caller.id()).await?;
    Ok(Json(ApiResponse::ok(record)))
}

#[utoipa::path(
    get,
    path = "/phi",
    params(PhiListQuery),
    responses(
        (status = 200, description = "PHI records, newest first", body = [PhiRecord]),
        (status = 400, description = "userId missing or pmiNumber blank"),
        (status = 401, description = "Missing or unknown bearer token"),
        (status = 403, description = "Wrong role or another user's records"),
        (status = 500, description = "Internal server error")
    )
)]
/// List the caller's PHI records
///
/// With `pmiNumber`, the list holds at most the newest record carrying that PMI number.
///
/// # Errors
/// Returns `400 Bad Request` if `userId` is absent and `403 Forbidden` if it names anyone but
/// the caller.
#[axum::debug_handler]
pub async fn list_phi(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<PhiListQuery>,
) -> ApiResult<Vec<PhiRecord>> {
    caller.require_role(Role::CaseManager)?;
    let user_id = required_user_id(UserQuery {
        user_id: query.user_id,
    })?;
    caller.require_self(&user_id)?;

    let records = match query.pmi_number {
        Some(pmi) => state
            .service
            .find_phi_by_pmi(&pmi, &user_id)
            .await?
            .into_iter()
            .collect(),
        None => state.service.list_phi(&user_id).await?,
    };
    Ok(Json(ApiResponse::ok(records)))
}

// ============================================================================
// Referrals
// ============================================================================

#[utoipa::path(
    get,
    path = "/referrals",
    params(UserQuery),
    responses(
        (status = 200, description = "Referral workflow records with matched PHI fields merged in", body = [ReferralRecord]),
        (status = 401, description = "Missing or unknown bearer token"),
        (status = 403, description = "No role, or another user's referrals"),
        (status = 500, description = "Internal server error")
    )
)]
/// List referrals
///
/// With `userId`, returns that case manager's reconciled referrals; the id must be the
/// caller's. Without it the caller's role decides: case managers get their own reconciled
/// referrals and providers get every pending referral with no PHI attached.
#[axum::debug_handler]
pub async fn list_referrals(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<UserQuery>,
) -> ApiResult<Vec<ReconciledReferral>> {
    if query.user_id.is_some() {
        caller.require_role(Role::CaseManager)?;
        let user_id = required_user_id(query)?;
        caller.require_self(&user_id)?;
        let items = state.service.reconciled_referrals(&user_id).await?;
        return Ok(Json(ApiResponse::ok(items)));
    }

    let items = match caller.role {
        Some(Role::CaseManager) => state.service.reconciled_referrals(caller.id()).await?,
        Some(Role::Provider) => state.service.open_referrals_for_provider().await?,
        None => return Err(ApiError::Forbidden("user has no assigned role".into())),
    };
    Ok(Json(ApiResponse::ok(items)))
}

#[utoipa::path(
    post,
    path = "/referrals",
    request_body = ReferralForm,
    responses(
        (status = 201, description = "PHI and workflow records created", body = SubmittedReferral),
        (status = 400, description = "Missing required fields"),
        (status = 401, description = "Missing or unknown bearer token"),
        (status = 403, description = "Caller is not a case manager"),
        (status = 500, description = "Store failure; any PHI written is removed again")
    )
)]
/// Submit a referral
///
/// Writes the PHI subset first, then the workflow record referencing it. A failed workflow
/// write removes the PHI record again before the error is returned.
///
/// # Errors
/// Returns `400 Bad Request` listing every missing field of `firstName`, `lastName`,
/// `dateOfBirth`, `pmiNumber` and `waiverType`; nothing is written in that case.
#[axum::debug_handler]
pub async fn submit_referral(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<ReferralForm>, JsonRejection>,
) -> CreatedResult<SubmittedReferral> {
    caller.require_role(Role::CaseManager)?;
    let form = json_body(payload)?;

    let submitted = state.service.submit(&form, caller.id()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            submitted,
            "Referral submitted successfully",
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/referrals/{id}",
    params(("id" = i64, Path, description = "Referral id")),
    responses(
        (status = 200, description = "Referral with matched PHI fields merged in", body = ReferralRecord),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Missing or unknown bearer token"),
        (status = 403, description = "Caller is not a case manager"),
        (status = 404, description = "No such referral for this caller"),
        (status = 500, description = "Internal server error")
    )
)]
/// Fetch one reconciled referral owned by the caller
#[axum::debug_handler]
pub async fn get_referral(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<ReconciledReferral> {
    caller.require_role(Role::CaseManager)?;
    let id = parse_referral_id(&id)?;

    let item = state.service.reconciled_referral(id, caller.id()).await?;
    Ok(Json(ApiResponse::ok(item)))
}

#[utoipa::path(
    patch,
    path = "/referrals/{id}/status",
    params(("id" = i64, Path, description = "Referral id")),
    request_body = StatusUpdateReq,
    responses(
        (status = 200, description = "Updated workflow record", body = ReferralRecord),
        (status = 400, description = "Malformed id or unknown status"),
        (status = 401, description = "Missing or unknown bearer token"),
        (status = 403, description = "Caller is not a case manager"),
        (status = 404, description = "No such referral for this caller"),
        (status = 500, description = "Internal server error")
    )
)]
/// Move a referral to a new lifecycle status
#[axum::debug_handler]
pub async fn update_referral_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdateReq>, JsonRejection>,
) -> ApiResult<ReferralRecord> {
    caller.require_role(Role::CaseManager)?;
    let id = parse_referral_id(&id)?;
    let req = json_body(payload)?;

    let updated = state
        .service
        .update_status(id, req.status, caller.id())
        .await?;
    Ok(Json(ApiResponse::ok(updated)))
}

// ============================================================================
// Dashboard
// ============================================================================

#[utoipa::path(
    get,
    path = "/dashboard",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Referral cards and bucket counts", body = DashboardView),
        (status = 400, description = "Unknown bucket"),
        (status = 401, description = "Missing or unknown bearer token"),
        (status = 403, description = "Caller is not a case manager"),
        (status = 500, description = "Internal server error")
    )
)]
/// Case manager dashboard
///
/// Counts are computed after the search filter so each tab's count matches its list.
#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<DashboardView> {
    caller.require_role(Role::CaseManager)?;
    let bucket = query
        .bucket
        .as_deref()
        .map(str::parse::<DashboardBucket>)
        .transpose()?
        .unwrap_or_default();

    let view = state
        .service
        .dashboard(caller.id(), query.search.as_deref(), bucket)
        .await?;
    Ok(Json(ApiResponse::ok(view)))
}
