//! REST error type and its mapping onto HTTP status codes.
//!
//! Every error leaves the server inside the standard envelope
//! (`{ "success": false, "error": "..." }`). Store failures are logged in full and reported to
//! the client only as a generic message.

use api_shared::{ApiResponse, AuthError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use referra_core::ReferralError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Unauthorized => "Authentication required".to_string(),
            ApiError::Forbidden(detail) => detail.clone(),
            ApiError::BadRequest(detail) => detail.clone(),
            ApiError::NotFound(detail) => detail.clone(),
            ApiError::Internal(detail) => {
                tracing::error!("API internal error: {}", detail);
                "Internal server error".to_string()
            }
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl From<ReferralError> for ApiError {
    fn from(err: ReferralError) -> Self {
        if err.is_client_error() {
            return ApiError::BadRequest(err.to_string());
        }
        if err.is_not_found() {
            return ApiError::NotFound(err.to_string());
        }
        if let ReferralError::CompensationFailed { phi_id, .. } = &err {
            tracing::error!("orphaned PHI {} after failed submission", phi_id);
        }
        ApiError::Internal(format!("{:?}", err))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken => ApiError::Unauthorized,
            other => ApiError::Internal(format!("{:?}", other)),
        }
    }
}
