/// Token codec
///
/// Mints and verifies the HS256 tokens that make up a session. The access and
/// refresh classes each get their own key pair and lifetime.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenClass};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError};

struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl ClassKeys {
    fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }
}

pub struct TokenCodec {
    issuer: String,
    access: ClassKeys,
    refresh: ClassKeys,
}

impl TokenCodec {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            issuer: settings.issuer.clone(),
            access: ClassKeys::new(&settings.access_secret, settings.access_token_expiry),
            refresh: ClassKeys::new(&settings.refresh_secret, settings.refresh_token_expiry),
        }
    }

    fn keys(&self, class: TokenClass) -> &ClassKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    /// Lifetime of `class` tokens in seconds; cookies use the same value.
    pub fn ttl_seconds(&self, class: TokenClass) -> i64 {
        self.keys(class).ttl_seconds
    }

    /// Mint a token of `class` for `user_id`, issued now
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn mint(&self, user_id: Uuid, class: TokenClass) -> Result<String, AppError> {
        self.mint_at(user_id, class, Utc::now().timestamp())
    }

    /// Mint with an explicit issue time (Unix seconds).
    pub fn mint_at(
        &self,
        user_id: Uuid,
        class: TokenClass,
        issued_at: i64,
    ) -> Result<String, AppError> {
        let keys = self.keys(class);
        let claims = Claims::new(
            user_id,
            class,
            issued_at,
            keys.ttl_seconds,
            self.issuer.clone(),
        );

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify `token` as a `class` token and return its subject
    ///
    /// # Errors
    /// `TokenExpired` once `exp` has passed, `TokenInvalid` for anything else
    /// (bad signature, wrong class, wrong issuer, malformed payload)
    pub fn verify(&self, token: &str, class: TokenClass) -> Result<Uuid, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let claims = decode::<Claims>(token, &self.keys(class).decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    tracing::debug!(error = %e, ?class, "Token rejected");
                    AuthError::TokenInvalid
                }
            })?;

        if claims.typ != class {
            return Err(AuthError::TokenInvalid);
        }
        claims.user_id()
    }
}
