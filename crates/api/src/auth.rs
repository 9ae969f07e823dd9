//! Caller identity.
//!
//! Session issuance lives in the fronting authenticator, which forwards the
//! authenticated user's ID in a header. The role is always resolved from the
//! user row, never taken from the request.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use domain::policy;
use store::{Store, User};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::orders::AppState;

/// Header carrying the authenticated caller's user ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, resolved against the store.
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<Arc<AppState<S>>> for CurrentUser
where
    S: Store + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let uuid = Uuid::parse_str(raw).map_err(|_| ApiError::Unauthorized)?;

        let user = state
            .store
            .get_user(UserId::from_uuid(uuid))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or(ApiError::Unauthorized)?;

        Ok(CurrentUser(user))
    }
}

/// Rejects non-admin callers with a generic denial.
pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if policy::can_manage_catalog(user) {
        Ok(())
    } else {
        Err(ApiError::AccessDenied)
    }
}
