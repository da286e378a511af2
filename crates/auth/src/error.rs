use thiserror::Error;

use crate::repository::RepositoryError;
use crate::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("user with this email already exists")]
    DuplicateEmail,

    /// Unknown email and wrong password both end up here.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token validation failed: {0}")]
    TokenInvalid(String),

    #[error("Token subject is not a user id")]
    TokenMalformed,

    #[error("unexpected signing method")]
    UnexpectedSigningMethod,

    #[error("Token generation failed: {0}")]
    TokenGenerationError(String),

    #[error("invalid credential format")]
    InvalidFormat,

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("password hashing timed out")]
    HashTimeout,

    #[error("system randomness source unavailable")]
    RandomnessUnavailable,

    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),
}

impl AuthError {
    /// True for failures the client caused and may be told about verbatim.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AuthError::Validation(_)
                | AuthError::DuplicateEmail
                | AuthError::InvalidCredentials
                | AuthError::TokenExpired
                | AuthError::TokenInvalid(_)
                | AuthError::TokenMalformed
                | AuthError::UnexpectedSigningMethod
        )
    }

    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            AuthError::TokenExpired
                | AuthError::TokenInvalid(_)
                | AuthError::TokenMalformed
                | AuthError::UnexpectedSigningMethod
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
