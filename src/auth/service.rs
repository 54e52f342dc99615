/// Login, logout and refresh flows
///
/// Sequences the credential store, password verifier and token issuer.
/// Side effects are strictly ordered: no refresh token is minted unless
/// the access token was signed, and the caller only sets the cookie once
/// the refresh token is persisted.

use std::sync::Arc;

use crate::auth::issuer::TokenIssuer;
use crate::auth::models::{ClientContext, LoginOutcome, LoginRequest};
use crate::auth::password::PasswordVerifier;
use crate::error::{AppError, AuthError, StoreError};
use crate::store::CredentialStore;
use crate::validators::validate_login_request;

/// Receives revocation failures that logout swallows
pub type RevocationFailureHook = Arc<dyn Fn(&StoreError) + Send + Sync>;

fn log_revocation_failure(error: &StoreError) {
    tracing::warn!(error = %error, "Refresh token revocation failed during logout");
}

#[derive(Clone)]
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    issuer: TokenIssuer,
    verifier: PasswordVerifier,
    on_revocation_failure: RevocationFailureHook,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        issuer: TokenIssuer,
        verifier: PasswordVerifier,
    ) -> Self {
        Self {
            credentials,
            issuer,
            verifier,
            on_revocation_failure: Arc::new(log_revocation_failure),
        }
    }

    pub fn with_revocation_failure_hook(mut self, hook: RevocationFailureHook) -> Self {
        self.on_revocation_failure = hook;
        self
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Authenticate and open a session
    ///
    /// # Errors
    /// - `Validation` for malformed input
    /// - `Auth(InvalidCredentials)` for an unknown email or a wrong password
    /// - `Store` / `Token` / `Internal` for everything that is our fault
    pub async fn login(
        &self,
        request: &LoginRequest,
        client: &ClientContext,
    ) -> Result<LoginOutcome, AppError> {
        let email = validate_login_request(request)?;

        let user = match self.credentials.find_user_login_details(&email).await? {
            Some(user) => user,
            None => {
                // Same bcrypt cost as a real mismatch.
                self.verifier.verify_against_dummy(&request.password).await?;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !self.verifier.verify(&user.password_hash, &request.password).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let access_token = self.issuer.issue_access_token(user.id)?;
        let refresh_token = self
            .issuer
            .issue_refresh_token(user.id, &client.device_info, &client.ip_address)
            .await?;

        Ok(LoginOutcome {
            user_id: user.id,
            access_token,
            refresh_token,
        })
    }

    /// End a session. Never fails from the caller's point of view.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let token = match refresh_token {
            Some(token) => token,
            None => return,
        };

        if let Err(error) = self.issuer.revoke_refresh_token(token).await {
            (self.on_revocation_failure)(&error);
        }
    }

    /// Trade a valid refresh token for a new access token and a rotated refresh token
    ///
    /// Of several concurrent refreshes with the same token, only one wins.
    ///
    /// # Errors
    /// - `Auth(MissingToken)` if no token was sent
    /// - `Auth(TokenInvalid)` for unknown, revoked, expired or already redeemed tokens
    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
        client: &ClientContext,
    ) -> Result<LoginOutcome, AppError> {
        let old_token = refresh_token.ok_or(AuthError::MissingToken)?;
        let user_id = self.issuer.validate_refresh_token(old_token).await?;

        let access_token = self.issuer.issue_access_token(user_id)?;
        let refresh_token = self
            .issuer
            .rotate_refresh_token(old_token, user_id, &client.device_info, &client.ip_address)
            .await?;

        Ok(LoginOutcome {
            user_id,
            access_token,
            refresh_token,
        })
    }
}
