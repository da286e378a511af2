use auth::{LoginPayload, RegisterPayload};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    AppState,
    error::ApiError,
    middleware::AuthUser,
    session::{clear_session_cookie, extract_session_token, session_cookie},
};

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

fn cookie_headers(state: &AppState, token: &str) -> Result<HeaderMap, ApiError> {
    let ttl = state.auth.tokens().ttl().num_seconds();
    let cookie = session_cookie(token, ttl).map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok(headers)
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let (user, token) = state.auth.register(payload).await?;
    let headers = cookie_headers(&state, &token)?;

    let response = RegisterResponse {
        username: user.username,
        email: user.email,
        created_at: user.created_at,
    };
    Ok((StatusCode::CREATED, headers, Json(response)))
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let (token, _user) = state.auth.login(payload).await?;
    let headers = cookie_headers(&state, &token)?;

    Ok((StatusCode::OK, headers, Json(MessageResponse { message: "logged in" })))
}

/// POST /logout
///
/// Only clears the cookie. Tokens are stateless, so a copy of the old
/// cookie stays valid until it expires.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    request_headers: HeaderMap,
) -> impl IntoResponse {
    let user_id = extract_session_token(&request_headers)
        .and_then(|token| state.auth.validate(&token).ok());
    tracing::info!(user_id, "user logged out");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie());
    (StatusCode::OK, headers, Json(MessageResponse { message: "logged out" }))
}

/// GET /me
pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .auth
        .get_user(user_id)
        .await?
        .ok_or(ApiError::NotFound("user not found"))?;

    Ok(Json(ProfileResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        created_at: user.created_at,
    }))
}
