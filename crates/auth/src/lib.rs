// Core modules
mod error;
mod jwt;
mod password;
pub mod validation;

// Persistence-facing modules
pub mod model;
pub mod repository;
pub mod service;

// Re-export error types
pub use error::{AuthError, Result};

// Re-export crypto primitives (for standalone use without a repository)
pub use jwt::{Claims, SIGNING_ALGORITHM, TokenService};
pub use password::{hash_password, verify_password};

pub use model::{LoginPayload, NewUser, RegisterPayload, User};
pub use repository::{InMemoryUserRepository, PgUserRepository, RepositoryError, UserRepository};
pub use service::{AuthService, default_hash_concurrency};
pub use validation::ValidationErrors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AuthError, AuthService, Claims, InMemoryUserRepository, LoginPayload, PgUserRepository,
        RegisterPayload, Result, TokenService, User, UserRepository,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_jwt_token() {
        let tokens = TokenService::new("test_secret_key_for_jwt", chrono::Duration::seconds(3600));

        let token = tokens.issue(42).unwrap();
        assert_eq!(tokens.validate(&token).unwrap(), 42);
    }
}
