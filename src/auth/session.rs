/// Session lifecycle: register, login, refresh rotation and logout
///
/// A session is nothing but an access/refresh token pair held in cookies. The
/// only server-side state is the bcrypt hash of the current refresh token on
/// the user record. Overwriting that hash ends every older session, which is
/// what makes each refresh token single-use.

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::claims::TokenClass;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::refresh_token::{hash_refresh_token, verify_refresh_token};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError, DatabaseError};
use crate::models::{NewUser, User};
use crate::store::UserStore;

/// Freshly minted tokens plus the cookie lifetimes that go with them
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

pub struct SessionManager {
    users: Arc<dyn UserStore>,
    codec: Arc<TokenCodec>,
    hash_cost: u32,
    atomic_rotation: bool,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        codec: Arc<TokenCodec>,
        settings: &AuthSettings,
    ) -> Self {
        Self {
            users,
            codec,
            hash_cost: settings.hash_cost,
            atomic_rotation: settings.atomic_rotation,
        }
    }

    /// Create an account and open its first session.
    ///
    /// `email` must already be normalised.
    ///
    /// # Errors
    /// Duplicate-entry error if the email is registered
    pub async fn register(
        &self,
        name: String,
        email: String,
        password: String,
    ) -> Result<(User, TokenPair), AppError> {
        if self.users.find_credentials_by_email(&email).await?.is_some() {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            )));
        }

        let password_hash = hash_password(password, self.hash_cost).await?;
        let user = self
            .users
            .create_user(NewUser {
                name,
                email,
                password_hash,
            })
            .await?;

        let pair = self.open_session(user.id).await?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok((user, pair))
    }

    /// Check credentials and replace any existing session.
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn login(
        &self,
        email: &str,
        password: String,
    ) -> Result<(User, TokenPair), AppError> {
        let credentials = match self.users.find_credentials_by_email(email).await? {
            Some(credentials) => credentials,
            None => {
                tracing::warn!("Login rejected");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_password(password, credentials.password_hash).await? {
            tracing::warn!("Login rejected");
            return Err(AuthError::InvalidCredentials.into());
        }

        let pair = self.open_session(credentials.user.id).await?;
        tracing::info!(user_id = %credentials.user.id, "User logged in");
        Ok((credentials.user, pair))
    }

    /// Rotate the pair behind a presented refresh token.
    ///
    /// The stored hash is overwritten on success, so the presented token can
    /// never be used again. A token that verifies but does not match the
    /// stored hash is a replay of a superseded token.
    ///
    /// # Errors
    /// * `MissingToken` when no refresh cookie was sent
    /// * `TokenExpired` / `TokenInvalid` from the codec
    /// * `Forbidden` when the user is gone or has no live session
    /// * `ReuseDetected` on hash mismatch
    pub async fn refresh(&self, presented: Option<&str>) -> Result<TokenPair, AppError> {
        let token = presented
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let user_id = self.codec.verify(token, TokenClass::Refresh)?;

        let stored_hash = self
            .users
            .find_credentials_by_id(user_id)
            .await?
            .and_then(|c| c.refresh_token_hash)
            .ok_or(AuthError::Forbidden)?;

        if !verify_refresh_token(token, &stored_hash).await? {
            log_reuse(user_id);
            return Err(AuthError::ReuseDetected.into());
        }

        let pair = self.mint_pair(user_id)?;
        let new_hash = hash_refresh_token(&pair.refresh_token, self.hash_cost).await?;

        if self.atomic_rotation {
            let rotated = self
                .users
                .replace_refresh_token_hash(user_id, &stored_hash, new_hash)
                .await?;
            if !rotated {
                log_reuse(user_id);
                return Err(AuthError::ReuseDetected.into());
            }
        } else {
            // Read-then-write: two concurrent refreshes with the same token can
            // both get here. The later write wins. See `auth.atomic_rotation`.
            self.users
                .set_refresh_token_hash(user_id, Some(new_hash))
                .await?;
        }

        tracing::info!(user_id = %user_id, "Session refreshed");
        Ok(pair)
    }

    /// Drop the stored refresh hash. Calling it again is harmless.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.users.set_refresh_token_hash(user_id, None).await?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    fn mint_pair(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.codec.mint(user_id, TokenClass::Access)?,
            refresh_token: self.codec.mint(user_id, TokenClass::Refresh)?,
            access_ttl_seconds: self.codec.ttl_seconds(TokenClass::Access),
            refresh_ttl_seconds: self.codec.ttl_seconds(TokenClass::Refresh),
        })
    }

    async fn open_session(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        let pair = self.mint_pair(user_id)?;
        let hash = hash_refresh_token(&pair.refresh_token, self.hash_cost).await?;
        self.users.set_refresh_token_hash(user_id, Some(hash)).await?;
        Ok(pair)
    }
}

fn log_reuse(user_id: Uuid) {
    tracing::error!(
        user_id = %user_id,
        operation = "token_refresh",
        "Refresh token reuse detected"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn settings(atomic_rotation: bool) -> AuthSettings {
        AuthSettings {
            access_secret: "access-secret-key-at-least-32-characters".to_string(),
            refresh_secret: "refresh-secret-key-at-least-32-characters".to_string(),
            issuer: "test".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604_800,
            hash_cost: 4,
            atomic_rotation,
        }
    }

    fn manager_with(atomic_rotation: bool) -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let settings = settings(atomic_rotation);
        let codec = Arc::new(TokenCodec::new(&settings));
        let manager = SessionManager::new(store.clone(), codec, &settings);
        (manager, store)
    }

    async fn registered(manager: &SessionManager) -> (User, TokenPair) {
        manager
            .register("T".into(), "t@e.com".into(), "password123".into())
            .await
            .unwrap()
    }

    fn auth_error(err: AppError) -> AuthError {
        match err {
            AppError::Auth(e) => e,
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_stores_only_hashes() {
        let (manager, store) = manager_with(false);
        let (user, pair) = registered(&manager).await;

        let creds = store.find_credentials_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(creds.password_hash.as_str(), "password123");
        let stored = creds.refresh_token_hash.unwrap();
        assert_ne!(stored, pair.refresh_token);
        assert!(verify_refresh_token(&pair.refresh_token, &stored).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let (manager, _) = manager_with(false);
        registered(&manager).await;
        let err = manager
            .register("Other".into(), "t@e.com".into(), "password456".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Database(DatabaseError::UniqueConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (manager, _) = manager_with(false);
        registered(&manager).await;

        let unknown = manager.login("nobody@e.com", "password123".into()).await.unwrap_err();
        let wrong = manager.login("t@e.com", "wrongpass".into()).await.unwrap_err();
        assert_eq!(auth_error(unknown), AuthError::InvalidCredentials);
        assert_eq!(auth_error(wrong), AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_rotation_invalidates_previous_refresh_token() {
        let (manager, _) = manager_with(false);
        let (_, first) = registered(&manager).await;

        let second = manager.refresh(Some(&first.refresh_token)).await.unwrap();
        let replay = manager.refresh(Some(&first.refresh_token)).await.unwrap_err();
        assert_eq!(auth_error(replay), AuthError::ReuseDetected);

        assert!(manager.refresh(Some(&second.refresh_token)).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_replaces_previous_session() {
        let (manager, _) = manager_with(false);
        registered(&manager).await;

        let (_, first) = manager.login("t@e.com", "password123".into()).await.unwrap();
        let (_, second) = manager.login("t@e.com", "password123".into()).await.unwrap();

        let err = manager.refresh(Some(&first.refresh_token)).await.unwrap_err();
        assert_eq!(auth_error(err), AuthError::ReuseDetected);
        assert!(manager.refresh(Some(&second.refresh_token)).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_without_token_or_session() {
        let (manager, _) = manager_with(false);
        let err = manager.refresh(None).await.unwrap_err();
        assert_eq!(auth_error(err), AuthError::MissingToken);

        let (user, pair) = registered(&manager).await;
        manager.logout(user.id).await.unwrap();
        let err = manager.refresh(Some(&pair.refresh_token)).await.unwrap_err();
        assert_eq!(auth_error(err), AuthError::Forbidden);
    }

    #[tokio::test]
    async fn test_access_token_cannot_refresh() {
        let (manager, _) = manager_with(false);
        let (_, pair) = registered(&manager).await;
        let err = manager.refresh(Some(&pair.access_token)).await.unwrap_err();
        assert_eq!(auth_error(err), AuthError::TokenInvalid);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (manager, store) = manager_with(false);
        let (user, _) = registered(&manager).await;

        manager.logout(user.id).await.unwrap();
        manager.logout(user.id).await.unwrap();
        let creds = store.find_credentials_by_id(user.id).await.unwrap().unwrap();
        assert!(creds.refresh_token_hash.is_none());
    }

    #[tokio::test]
    async fn test_atomic_rotation_rejects_lost_race() {
        let (manager, store) = manager_with(true);
        let (user, first) = registered(&manager).await;

        let original = store
            .find_credentials_by_id(user.id)
            .await
            .unwrap()
            .unwrap()
            .refresh_token_hash
            .unwrap();
        let second = manager.refresh(Some(&first.refresh_token)).await.unwrap();
        // A concurrent refresh that read `original` before this rotation loses.
        assert!(!store
            .replace_refresh_token_hash(user.id, &original, "stale".into())
            .await
            .unwrap());

        assert!(manager.refresh(Some(&second.refresh_token)).await.is_ok());
    }
}
