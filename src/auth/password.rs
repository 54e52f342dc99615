/// Password Hashing and Verification
///
/// bcrypt with embedded salt and cost factor. Verification runs on the
/// blocking pool since a single comparison takes tens of milliseconds.

use bcrypt::{hash, verify};
use std::sync::Arc;

use crate::error::AppError;

const DUMMY_PASSWORD: &str = "dummy-password-for-unknown-accounts";

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if the cost is out of range or hashing fails
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// A malformed hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}

/// Compares credentials off the async executor
///
/// Holds a dummy hash with the same cost as real ones so that a login for
/// an unknown email does the same amount of work as a wrong password.
#[derive(Clone)]
pub struct PasswordVerifier {
    dummy_hash: Arc<str>,
}

impl PasswordVerifier {
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let dummy_hash = hash_password(DUMMY_PASSWORD, cost)?;
        Ok(Self {
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    pub async fn verify(&self, hash: &str, password: &str) -> Result<bool, AppError> {
        let hash = hash.to_string();
        let password = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?;
        Ok(matches)
    }

    /// Burns one bcrypt comparison and discards the result
    pub async fn verify_against_dummy(&self, password: &str) -> Result<(), AppError> {
        let dummy_hash = Arc::clone(&self.dummy_hash);
        self.verify(&dummy_hash, password).await?;
        Ok(())
    }
}
