/// Token issuing and refresh token lifecycle
///
/// Refresh tokens are:
/// - 64 random alphanumeric characters from the thread-local CSPRNG
/// - Stored only as a SHA-256 digest, bound to user, device and IP
/// - Soft-revoked; expired rows can be purged
///
/// Store writes run on their own task. If the request future is dropped
/// halfway, the write still completes.

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::jwt::generate_access_token;
use crate::auth::models::{AccessToken, RefreshToken};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, StoreError, TokenError};
use crate::store::{NewRefreshToken, TokenStore};

const REFRESH_TOKEN_LENGTH: usize = 64;

/// Generate a new refresh token
///
/// The value is random and unrelated to the user or client it is bound to.
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest used as the storage key
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn run_detached<T, F>(operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
}

#[derive(Clone)]
pub struct TokenIssuer {
    settings: JwtSettings,
    store: Arc<dyn TokenStore>,
}

impl TokenIssuer {
    pub fn new(settings: JwtSettings, store: Arc<dyn TokenStore>) -> Self {
        Self { settings, store }
    }

    /// Sign a short-lived access token. Touches no storage.
    pub fn issue_access_token(&self, user_id: Uuid) -> Result<AccessToken, TokenError> {
        generate_access_token(&user_id, &self.settings)
    }

    /// Mint a refresh token and persist its binding
    ///
    /// # Errors
    /// Returns the store error if the record could not be written; the
    /// token is then discarded.
    pub async fn issue_refresh_token(
        &self,
        user_id: Uuid,
        device_info: &str,
        ip_address: &str,
    ) -> Result<RefreshToken, StoreError> {
        let token = generate_refresh_token();
        let record = NewRefreshToken {
            user_id,
            token_hash: hash_token(&token),
            device_info: device_info.to_string(),
            ip_address: ip_address.to_string(),
            expires_at: Utc::now() + Duration::seconds(self.settings.refresh_token_expiry),
        };

        let store = Arc::clone(&self.store);
        let saved =
            run_detached(async move { store.create_refresh_token_record(record).await }).await?;

        tracing::debug!(user_id = %user_id, token_id = %saved.id, "Refresh token issued");
        Ok(RefreshToken {
            token,
            expires_at: saved.expires_at,
        })
    }

    /// Revoke a refresh token
    ///
    /// Unknown and already revoked tokens are not an error; the result says
    /// whether this call was the one that revoked it.
    pub async fn revoke_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        let token_hash = hash_token(token);
        let store = Arc::clone(&self.store);
        run_detached(async move { store.revoke_by_token(&token_hash).await }).await
    }

    /// Resolve a refresh token to its user
    ///
    /// # Errors
    /// `TokenInvalid` for unknown, revoked or expired tokens; store errors
    /// pass through.
    pub async fn validate_refresh_token(&self, token: &str) -> Result<Uuid, AppError> {
        let record = self.store.find_by_token(&hash_token(token)).await?;

        match record {
            Some(record) if record.is_active(Utc::now()) => Ok(record.user_id),
            Some(record) if record.revoked => {
                tracing::warn!(user_id = %record.user_id, "Attempt to use revoked refresh token");
                Err(AuthError::TokenInvalid.into())
            }
            Some(record) => {
                tracing::info!(user_id = %record.user_id, "Refresh token expired");
                Err(AuthError::TokenInvalid.into())
            }
            None => {
                tracing::warn!("Refresh token not found");
                Err(AuthError::TokenInvalid.into())
            }
        }
    }

    /// Revoke `old_token` and issue its replacement
    ///
    /// # Errors
    /// `TokenInvalid` if another request revoked `old_token` first; no
    /// replacement is issued then.
    pub async fn rotate_refresh_token(
        &self,
        old_token: &str,
        user_id: Uuid,
        device_info: &str,
        ip_address: &str,
    ) -> Result<RefreshToken, AppError> {
        if !self.revoke_refresh_token(old_token).await? {
            tracing::warn!(user_id = %user_id, "Refresh token already redeemed");
            return Err(AuthError::TokenInvalid.into());
        }
        Ok(self
            .issue_refresh_token(user_id, device_info, ip_address)
            .await?)
    }

    /// Delete refresh token records whose expiry has passed
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let store = Arc::clone(&self.store);
        run_detached(async move { store.purge_expired(Utc::now()).await }).await
    }

    /// Spawn a task that purges expired records every `period`, starting now.
    pub fn spawn_cleanup_task(&self, period: std::time::Duration) -> JoinHandle<()> {
        let issuer = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match issuer.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(purged, "Expired refresh tokens purged"),
                    Err(e) => tracing::warn!("Could not purge expired refresh tokens: {}", e),
                }
            }
        })
    }
}
