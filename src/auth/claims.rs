/// JWT claims for both session token classes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Which half of the session a token belongs to.
///
/// Each class is signed with its own secret and carries its class in `typ`,
/// so a token of one class never verifies as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    /// Random per token; keeps two tokens minted in the same second distinct
    pub jti: String,
    pub typ: TokenClass,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        class: TokenClass,
        issued_at: i64,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            iat: issued_at,
            exp: issued_at + expiry_seconds,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
            typ: class,
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// `TokenInvalid` if `sub` is not a UUID
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }
}
