use crate::constants::BCRYPT_MAX_PASSWORD_BYTES;
use crate::core_auth::error::AuthError;
use bcrypt::{hash, verify};
use log::error;

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    if password.len() > BCRYPT_MAX_PASSWORD_BYTES {
        return Err(AuthError::HashError(format!(
            "password is {} bytes, limit is {}",
            password.len(),
            BCRYPT_MAX_PASSWORD_BYTES
        )));
    }
    hash(password, cost).map_err(|e| AuthError::HashError(e.to_string()))
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hashed_password: &str) -> bool {
    verify(password, hashed_password).unwrap_or_else(|e| {
        error!("Failed to verify password against stored hash: {}", e);
        false
    })
}
