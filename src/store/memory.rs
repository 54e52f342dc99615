/// In-memory stores for tests and local runs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{CredentialStore, NewRefreshToken, RefreshTokenRecord, TokenStore, UserRecord};
use crate::error::StoreError;

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

/// Mutex-guarded user and refresh token tables
///
/// `set_unavailable(true)` makes every call fail as if the database were down.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user and returns its id
    pub fn insert_user(&self, email: &str, password_hash: &str) -> Uuid {
        let id = Uuid::new_v4();
        let record = UserRecord {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        if let Ok(mut tables) = self.tables.lock() {
            tables.users.insert(email.to_string(), record);
        }
        id
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// All token records, in no particular order
    pub fn refresh_tokens(&self) -> Vec<RefreshTokenRecord> {
        self.tables
            .lock()
            .map(|tables| tables.refresh_tokens.values().cloned().collect())
            .unwrap_or_default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_user_login_details(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.tables()?.users.get(email).cloned())
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn create_refresh_token_record(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let mut tables = self.tables()?;
        if tables.refresh_tokens.contains_key(&token.token_hash) {
            return Err(StoreError::Query("duplicate refresh token".to_string()));
        }

        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: token.user_id,
            token_hash: token.token_hash,
            device_info: token.device_info,
            ip_address: token.ip_address,
            created_at: Utc::now(),
            expires_at: token.expires_at,
            revoked: false,
            revoked_at: None,
        };
        tables
            .refresh_tokens
            .insert(record.token_hash.clone(), record.clone());
        Ok(record)
    }

    async fn revoke_by_token(&self, token_hash: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        match tables.refresh_tokens.get_mut(token_hash) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                record.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_by_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self.tables()?.refresh_tokens.get(token_hash).cloned())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, record| !record.is_expired(now));
        Ok((before - tables.refresh_tokens.len()) as u64)
    }
}
