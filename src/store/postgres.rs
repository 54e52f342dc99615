/// PostgreSQL-backed stores
///
/// Schema lives in `migrations/`. Every call borrows a connection from the
/// shared pool; nothing is cached between calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, NewRefreshToken, RefreshTokenRecord, TokenStore, UserRecord};
use crate::error::StoreError;

type RefreshTokenRow = (
    Uuid,
    Uuid,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    bool,
    Option<DateTime<Utc>>,
);

fn into_record(row: RefreshTokenRow) -> RefreshTokenRecord {
    let (id, user_id, token_hash, device_info, ip_address, created_at, expires_at, revoked, revoked_at) =
        row;
    RefreshTokenRecord {
        id,
        user_id,
        token_hash,
        device_info,
        ip_address,
        created_at,
        expires_at,
        revoked,
        revoked_at,
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_login_details(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, email, password_hash)| UserRecord {
            id,
            email,
            password_hash,
        }))
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn create_refresh_token_record(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            INSERT INTO refresh_tokens
                (id, user_id, token_hash, device_info, ip_address, created_at, expires_at, is_revoked)
            VALUES ($1, $2, $3, $4, $5, $6, $7, false)
            RETURNING id, user_id, token_hash, device_info, ip_address,
                      created_at, expires_at, is_revoked, revoked_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(&token.device_info)
        .bind(&token.ip_address)
        .bind(Utc::now())
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(into_record(row))
    }

    async fn revoke_by_token(&self, token_hash: &str) -> Result<bool, StoreError> {
        // Single conditional UPDATE: only one caller can see a row affected.
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = true, revoked_at = $1
            WHERE token_hash = $2 AND is_revoked = false
            "#,
        )
        .bind(Utc::now())
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT id, user_id, token_hash, device_info, ip_address,
                   created_at, expires_at, is_revoked, revoked_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_record))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
