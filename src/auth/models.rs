/// Request, response and token types shared by the auth flows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// User login request
///
/// Missing fields decode as empty strings so they are reported by input
/// validation rather than as a JSON error.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body of every auth endpoint response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Field name to error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<HashMap<String, String>>,
}

impl AuthResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            access_token: None,
            errors: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            access_token: None,
            errors: None,
        }
    }

    pub fn with_access_token(mut self, token: String) -> Self {
        self.access_token = Some(token);
        self
    }
}

/// Identity behind a valid access token
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub user_id: String,
    pub expires_at: String,
}

/// Where a request came from, recorded on the refresh token
#[derive(Debug, Clone)]
pub struct ClientContext {
    /// User-Agent header, empty if absent
    pub device_info: String,
    pub ip_address: String,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Plaintext refresh token. Only its digest is stored.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Tokens minted by a successful login or refresh
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: Uuid,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}
