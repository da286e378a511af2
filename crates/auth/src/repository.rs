//! User persistence behind a small capability trait.
//!
//! [`PgUserRepository`] is the production variant; [`InMemoryUserRepository`]
//! backs hermetic tests of the auth workflow and the HTTP layer.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::model::{NewUser, User};

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique index rejected the row; for users that is the email.
    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            RepositoryError::UniqueViolation
        } else {
            RepositoryError::Database(err)
        }
    }
}

/// SQLSTATE 23505
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError>;

    /// Insert and return the stored row with its assigned id.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password, created_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, username, email, password, created_at",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }
}

/// Map-backed repository with the same uniqueness rule as the `users` table.
#[derive(Default)]
pub struct InMemoryUserRepository {
    inner: RwLock<MemoryUsers>,
}

#[derive(Default)]
struct MemoryUsers {
    next_id: i64,
    by_id: HashMap<i64, User>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.inner.read().await;
        Ok(users.by_id.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.inner.write().await;
        if users.by_id.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::UniqueViolation);
        }
        users.next_id += 1;
        let user = user.into_user(users.next_id);
        users.by_id.insert(user.id, user.clone());
        Ok(user)
    }
}
