/// Password Hashing and Verification
///
/// bcrypt is deliberately slow, so both directions run on the blocking pool
/// and never stall the request workers.

use bcrypt::{hash, verify};

use crate::error::AppError;
use crate::models::PasswordHash;

/// Hash a password using bcrypt
///
/// # Arguments
/// * `password` - Plain text password, already validated
/// * `cost` - bcrypt cost factor
///
/// # Errors
/// Returns error if bcrypt hashing fails or the blocking task panics
pub async fn hash_password(password: String, cost: u32) -> Result<PasswordHash, AppError> {
    let hashed = tokio::task::spawn_blocking(move || hash(password, cost))
        .await?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    Ok(PasswordHash::from_hashed(hashed))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns error if the stored hash is malformed
pub async fn verify_password(password: String, hash: PasswordHash) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify(password, hash.as_str()))
        .await?
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}
