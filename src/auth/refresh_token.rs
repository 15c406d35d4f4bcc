/// Refresh token hashing
///
/// The raw refresh token never reaches storage. It is reduced to a SHA-256
/// hex digest first (a JWT is longer than the 72 bytes bcrypt reads) and the
/// digest is then bcrypt-hashed like a password.

use bcrypt::{hash, verify};
use sha2::{Digest, Sha256};

use crate::error::AppError;

fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a refresh token for storage
///
/// # Errors
/// Returns error if bcrypt hashing fails
pub async fn hash_refresh_token(token: &str, cost: u32) -> Result<String, AppError> {
    let digest = digest(token);
    tokio::task::spawn_blocking(move || hash(digest, cost))
        .await?
        .map_err(|e| AppError::Internal(format!("Refresh token hashing failed: {}", e)))
}

/// Compare a presented refresh token with the stored hash.
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_refresh_token(token: &str, stored_hash: &str) -> Result<bool, AppError> {
    let digest = digest(token);
    let stored_hash = stored_hash.to_string();
    let matched = tokio::task::spawn_blocking(move || verify(digest, &stored_hash)).await?;

    Ok(matched.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Stored refresh token hash is malformed");
        false
    }))
}
