use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// The only algorithm tokens are signed or accepted with.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (decimal user ID)
    pub sub: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create new claims for the subject, valid for `ttl` from now
    pub fn new(subject: String, ttl: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + ttl;

        Self {
            sub: subject,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Issues and validates HS256 identity tokens.
///
/// The secret and lifetime are fixed at construction. Validation is pure
/// computation, so one instance can be shared by every request.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Token lifetime, also used as the cookie Max-Age.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a signed token whose subject is `user_id`
    pub fn issue(&self, user_id: i64) -> Result<String> {
        let claims = Claims::new(user_id.to_string(), self.ttl);

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenGenerationError(e.to_string()))
    }

    /// Validate a token and return the user id it was issued for.
    ///
    /// The header's `alg` is checked against [`SIGNING_ALGORITHM`] before the
    /// signature or any claim is looked at; the header never picks the key.
    pub fn validate(&self, token: &str) -> Result<i64> {
        let header =
            decode_header(token).map_err(|e| AuthError::TokenInvalid(e.to_string()))?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(AuthError::UnexpectedSigningMethod);
        }

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidAlgorithm => AuthError::UnexpectedSigningMethod,
                _ => AuthError::TokenInvalid(e.to_string()),
            })?
            .claims;

        if claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        claims.sub.parse().map_err(|_| AuthError::TokenMalformed)
    }
}
