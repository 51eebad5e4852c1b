//! Caller authentication for REST handlers.
//!
//! [`Caller`] is an axum extractor: adding it to a handler's arguments makes the route require a
//! valid `Authorization: Bearer <token>` header. Role and ownership checks are explicit calls on
//! the extracted value so each handler states what it needs.

use crate::error::ApiError;
use crate::state::AppState;
use api_shared::{parse_bearer, Role, SessionUser};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// The authenticated user making a request.
#[derive(Clone, Debug)]
pub struct Caller {
    pub user: SessionUser,
    pub role: Option<Role>,
}

impl Caller {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// Fails with 403 unless the caller has `role`.
    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        match self.role {
            Some(r) if r == role => Ok(()),
            Some(_) => Err(ApiError::Forbidden(format!(
                "this operation requires the {:?} role",
                role
            ))),
            None => Err(ApiError::Forbidden("user has no assigned role".into())),
        }
    }

    /// Fails with 403 unless `user_id` is the caller's own id.
    pub fn require_self(&self, user_id: &str) -> Result<(), ApiError> {
        if user_id == self.user.id {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "cannot access another user's records".into(),
            ))
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let token = parse_bearer(header)?;

        let user = state
            .sessions
            .current_user(token)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        let role = state.sessions.user_role(&user.id).await?;

        Ok(Caller { user, role })
    }
}
