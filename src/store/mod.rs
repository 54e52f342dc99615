/// Credential and refresh token storage
///
/// The service only talks to storage through the two traits below, so the
/// same orchestration runs against PostgreSQL in production and the
/// in-memory store in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Identity and password hash of a user, as needed for login
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// A persisted refresh token binding
///
/// Only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub device_info: String,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Not revoked and not expired
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired(now)
    }
}

/// Input for creating a refresh token record
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub device_info: String,
    pub ip_address: String,
    pub expires_at: DateTime<Utc>,
}

/// Read-only lookup of login details
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when no user has this email
    async fn find_user_login_details(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
}

/// Persistence for refresh token bindings
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn create_refresh_token_record(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError>;

    /// Marks the record revoked if it is not already.
    ///
    /// Returns `true` only for the call that flipped the flag, so two
    /// concurrent revocations of one token cannot both succeed. Unknown and
    /// already revoked tokens give `false`.
    async fn revoke_by_token(&self, token_hash: &str) -> Result<bool, StoreError>;

    async fn find_by_token(&self, token_hash: &str)
        -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Deletes records expired at `now`, returning how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
