use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::{AppState, error::ApiError, session::extract_session_token};

/// Gate for protected routes.
///
/// No `jwt` cookie means `authentication required`; a cookie that does not
/// validate means `invalid token`. On success the user id is stored in the
/// request extensions for [`AuthUser`] to pick up.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_session_token(request.headers()) else {
        tracing::warn!(path = %request.uri().path(), "rejected request without session cookie");
        return Err(ApiError::Unauthenticated);
    };

    let user_id = state.auth.validate(&token).map_err(|e| {
        tracing::warn!(path = %request.uri().path(), error = %e, "rejected session token");
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(request).await)
}

/// Extractor for the authenticated user id
/// Use this in handlers that are protected by [`require_auth`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(ApiError::Unauthenticated)
    }
}
