use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::{
    error::{AuthError, Result},
    jwt::TokenService,
    model::{LoginPayload, NewUser, RegisterPayload, User},
    password::{DUMMY_CREDENTIAL, hash_password, verify_password},
    repository::{RepositoryError, UserRepository},
};

/// Registration and login workflow over a pluggable user repository
pub struct AuthService {
    repo: Arc<dyn UserRepository>,
    tokens: TokenService,
    hash_timeout: Duration,
    /// One permit per KDF run that may be in flight, including runs whose
    /// caller already timed out.
    hash_slots: Arc<Semaphore>,
}

/// Default KDF concurrency: one run per available CPU.
pub fn default_hash_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

impl AuthService {
    /// Create a new AuthService
    ///
    /// # Arguments
    /// * `repo` - User persistence (PostgreSQL in production, in-memory in tests)
    /// * `tokens` - Token issuer/validator holding the signing secret and TTL
    /// * `hash_timeout` - Upper bound on a single password hash or verification,
    ///   including the wait for a free hashing slot
    ///
    /// Hashing concurrency defaults to [`default_hash_concurrency`].
    pub fn new(repo: Arc<dyn UserRepository>, tokens: TokenService, hash_timeout: Duration) -> Self {
        Self {
            repo,
            tokens,
            hash_timeout,
            hash_slots: Arc::new(Semaphore::new(default_hash_concurrency())),
        }
    }

    /// Limit how many password hashes may run at once. Each run holds
    /// 64 MiB, so this bounds KDF memory to `max * 64 MiB`.
    pub fn with_max_concurrent_hashes(mut self, max: usize) -> Self {
        self.hash_slots = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new user and issue their first token
    ///
    /// The email pre-check only gives a fast answer; the unique index is what
    /// actually decides a race between two registrations.
    pub async fn register(&self, payload: RegisterPayload) -> Result<(User, String)> {
        let payload = payload.normalized();
        payload.validate().map_err(AuthError::Validation)?;

        if self.repo.get_user_by_email(&payload.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password = payload.password;
        let password_hash = self.run_kdf(move || hash_password(&password)).await?;

        let user = self
            .repo
            .create_user(NewUser::new(payload.username, payload.email, password_hash))
            .await
            .map_err(|e| match e {
                RepositoryError::UniqueViolation => AuthError::DuplicateEmail,
                other => AuthError::Persistence(other),
            })?;

        let token = self.tokens.issue(user.id)?;
        tracing::info!(user_id = user.id, "user registered");

        Ok((user, token))
    }

    /// Check credentials and return a fresh token
    ///
    /// Unknown email and wrong password are indistinguishable to the caller,
    /// including in how long they take.
    pub async fn login(&self, payload: LoginPayload) -> Result<(String, User)> {
        let payload = payload.normalized();
        payload.validate().map_err(AuthError::Validation)?;

        let user = self.repo.get_user_by_email(&payload.email).await?;
        let stored = user
            .as_ref()
            .map(|u| u.password_hash.clone())
            .unwrap_or_else(|| DUMMY_CREDENTIAL.to_string());

        let password = payload.password;
        let verified = self.run_kdf(move || verify_password(&password, &stored)).await;

        let user = match (user, verified) {
            (Some(user), Ok(true)) => user,
            (_, Ok(_)) => return Err(AuthError::InvalidCredentials),
            (user, Err(AuthError::InvalidFormat)) => {
                tracing::error!(user_id = user.map(|u| u.id), "stored credential is malformed");
                return Err(AuthError::InvalidCredentials);
            }
            (_, Err(e)) => return Err(e),
        };

        let token = self.tokens.issue(user.id)?;
        tracing::info!(user_id = user.id, "user logged in");

        Ok((token, user))
    }

    /// Validate a token and return the user id
    pub fn validate(&self, token: &str) -> Result<i64> {
        self.tokens.validate(token)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.repo.get_user_by_id(id).await?)
    }

    /// Run KDF work on the blocking pool, bounded by `hash_timeout`.
    ///
    /// The work waits for a hashing slot first; the timeout covers the wait
    /// too. On timeout the blocking task is abandoned rather than cancelled:
    /// it keeps its slot until it finishes and its result is dropped.
    async fn run_kdf<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let slots = Arc::clone(&self.hash_slots);
        let job = async move {
            let permit = slots
                .acquire_owned()
                .await
                .map_err(|e| AuthError::HashingError(e.to_string()))?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                work()
            })
            .await
            .map_err(|join_err| AuthError::HashingError(join_err.to_string()))?
        };

        match tokio::time::timeout(self.hash_timeout, job).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::HashTimeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryUserRepository;
    use async_trait::async_trait;

    fn service_with(repo: Arc<dyn UserRepository>) -> AuthService {
        AuthService::new(
            repo,
            TokenService::new("test_secret", chrono::Duration::seconds(3600)),
            Duration::from_secs(30),
        )
    }

    fn service() -> AuthService {
        service_with(Arc::new(InMemoryUserRepository::new()))
    }

    fn alice() -> RegisterPayload {
        RegisterPayload {
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password: "Secret123!".to_string(),
        }
    }

    fn login(email: &str, password: &str) -> LoginPayload {
        LoginPayload {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let service = service();

        let (user, token) = service.register(alice()).await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(service.validate(&token).unwrap(), user.id);
        assert!(verify_password("Secret123!", &user.password_hash).unwrap());

        let (token, logged_in) = service.login(login("A@X.com ", "Secret123!")).await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(service.validate(&token).unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_payload() {
        let service = service();
        let payload = RegisterPayload {
            password: "password".to_string(),
            ..alice()
        };

        match service.register(payload).await {
            Err(AuthError::Validation(errors)) => {
                assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["password"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let service = service();
        service.register(alice()).await.unwrap();

        let again = RegisterPayload {
            username: "alice2".to_string(),
            email: " A@x.COM".to_string(),
            ..alice()
        };
        assert!(matches!(
            service.register(again).await,
            Err(AuthError::DuplicateEmail)
        ));
    }

    /// Lets every pre-check through, so only the insert can catch duplicates.
    struct RacingRepo(InMemoryUserRepository);

    #[async_trait]
    impl UserRepository for RacingRepo {
        async fn get_user_by_email(&self, _: &str) -> std::result::Result<Option<User>, RepositoryError> {
            Ok(None)
        }

        async fn get_user_by_id(&self, id: i64) -> std::result::Result<Option<User>, RepositoryError> {
            self.0.get_user_by_id(id).await
        }

        async fn create_user(&self, user: NewUser) -> std::result::Result<User, RepositoryError> {
            self.0.create_user(user).await
        }
    }

    #[tokio::test]
    async fn test_insert_conflict_maps_to_duplicate_email() {
        let service = service_with(Arc::new(RacingRepo(InMemoryUserRepository::new())));
        service.register(alice()).await.unwrap();

        assert!(matches!(
            service.register(alice()).await,
            Err(AuthError::DuplicateEmail)
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let service = service();
        service.register(alice()).await.unwrap();

        let wrong_password = service
            .login(login("a@x.com", "Wrong123!"))
            .await
            .unwrap_err();
        let unknown_email = service
            .login(login("nobody@x.com", "Secret123!"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_with_corrupt_credential() {
        let repo = Arc::new(InMemoryUserRepository::new());
        repo.create_user(NewUser::new(
            "bob".to_string(),
            "b@x.com".to_string(),
            "not-a-credential".to_string(),
        ))
        .await
        .unwrap();

        let service = service_with(repo);
        assert!(matches!(
            service.login(login("b@x.com", "Secret123!")).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_hash_timeout() {
        let service = AuthService::new(
            Arc::new(InMemoryUserRepository::new()),
            TokenService::new("test_secret", chrono::Duration::seconds(3600)),
            Duration::ZERO,
        );

        assert!(matches!(
            service.register(alice()).await,
            Err(AuthError::HashTimeout)
        ));
    }

    #[tokio::test]
    async fn test_excess_hashes_wait_for_a_slot() {
        let service = service().with_max_concurrent_hashes(1);
        let held = service.hash_slots.clone().acquire_owned().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(200), service.register(alice())).await;
        assert!(waiting.is_err(), "register ran without a free hashing slot");

        drop(held);
        service.register(alice()).await.unwrap();
        assert_eq!(service.hash_slots.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_waiting_for_a_slot_counts_against_timeout() {
        let service = AuthService::new(
            Arc::new(InMemoryUserRepository::new()),
            TokenService::new("test_secret", chrono::Duration::seconds(3600)),
            Duration::from_millis(50),
        )
        .with_max_concurrent_hashes(1);
        let _held = service.hash_slots.clone().acquire_owned().await.unwrap();

        assert!(matches!(
            service.login(login("a@x.com", "Secret123!")).await,
            Err(AuthError::HashTimeout)
        ));
    }

    #[tokio::test]
    async fn test_get_user() {
        let service = service();
        let (user, _) = service.register(alice()).await.unwrap();

        let fetched = service.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
        assert!(service.get_user(user.id + 1).await.unwrap().is_none());
    }
}
