//! Argon2id credential derivation.
//!
//! Stored credentials have the shape `base64(salt)$base64(hash)` with unpadded
//! standard base64, a 16 byte salt and a 32 byte key. The cost parameters are
//! compiled in; changing them invalidates every stored credential.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use rand_core::{OsRng, RngCore};

use crate::error::{AuthError, Result};

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

const TIME_COST: u32 = 1;
const MEMORY_COST_KIB: u32 = 64 * 1024;
const PARALLELISM: u32 = 4;

/// Well-formed credential that matches no password. Verifying against it keeps
/// the unknown-email login path as expensive as the wrong-password one.
pub(crate) const DUMMY_CREDENTIAL: &str =
    "AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

fn argon2() -> Result<Argon2<'static>> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(KEY_LEN))
        .map_err(|e| AuthError::HashingError(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn derive(password: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    let mut key = [0u8; KEY_LEN];
    argon2()?
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| AuthError::HashingError(e.to_string()))?;
    Ok(key)
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|_| AuthError::RandomnessUnavailable)?;

    let key = derive(password, &salt)?;

    Ok(format!(
        "{}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(key)
    ))
}

/// Verify a password against a stored credential
///
/// Returns `Ok(false)` on mismatch and `Err(InvalidFormat)` when the stored
/// string is not a credential at all.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let (salt, expected) = parse_credential(stored)?;
    let actual = derive(password, &salt)?;
    Ok(constant_time_eq(&expected, &actual))
}

fn parse_credential(stored: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    let (Some(salt), Some(hash), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::InvalidFormat);
    };

    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| AuthError::InvalidFormat)?;
    let hash = STANDARD_NO_PAD
        .decode(hash)
        .map_err(|_| AuthError::InvalidFormat)?;

    if salt.len() != SALT_LEN || hash.len() != KEY_LEN {
        return Err(AuthError::InvalidFormat);
    }
    Ok((salt, hash))
}

/// Compare without an early exit on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
