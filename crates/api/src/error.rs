use ads::AdsError;
use auth::AuthError;
use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use storage::StorageError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Every failure a handler or the auth middleware can produce.
#[derive(Debug)]
pub enum ApiError {
    /// No usable `jwt` cookie on a protected route
    Unauthenticated,
    Auth(AuthError),
    Ads(AdsError),
    BadRequest(String),
    Multipart(MultipartError),
    NotFound(&'static str),
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<AdsError> for ApiError {
    fn from(err: AdsError) -> Self {
        ApiError::Ads(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart(err)
    }
}

fn internal(detail: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!(error = %detail, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".to_string(),
    )
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "authentication required".to_string())
            }
            ApiError::Auth(err) => match err {
                AuthError::Validation(_) | AuthError::DuplicateEmail => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, err.to_string()),
                err if err.is_token_error() => {
                    (StatusCode::UNAUTHORIZED, "invalid token".to_string())
                }
                err => internal(err),
            },
            ApiError::Ads(err) => match err {
                AdsError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                AdsError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
                AdsError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                AdsError::Forbidden => (StatusCode::FORBIDDEN, err.to_string()),
                AdsError::Storage(StorageError::NotFound(_)) => {
                    (StatusCode::NOT_FOUND, "image not found".to_string())
                }
                err => internal(err),
            },
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Multipart(err) => (err.status(), err.body_text()),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            ApiError::Internal(detail) => internal(detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_message();
        (status, Json(ErrorResponse { error })).into_response()
    }
}
