/// Access token signing and validation
///
/// Access tokens are HS256 JWTs. They are never persisted; a token is
/// valid if its signature, issuer and expiry check out.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::models::AccessToken;
use crate::configuration::JwtSettings;
use crate::error::{AuthError, TokenError};

/// Generate a new access token for a user
///
/// # Errors
/// `SigningKeyUnavailable` if no secret is configured, `Encoding` if
/// signing fails.
pub fn generate_access_token(
    user_id: &Uuid,
    config: &JwtSettings,
) -> Result<AccessToken, TokenError> {
    if config.secret.is_empty() {
        return Err(TokenError::SigningKeyUnavailable);
    }

    let claims = Claims::new(*user_id, config.access_token_expiry, config.issuer.clone());

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| TokenError::Encoding(e.to_string()))?;

    Ok(AccessToken {
        token,
        expires_at: claims.expires_at(),
    })
}

/// Validate and extract claims from an access token
///
/// # Errors
/// `TokenInvalid` if the token is malformed, expired, tampered with or
/// was issued by someone else.
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AuthError> {
    if config.secret.is_empty() {
        return Err(AuthError::TokenInvalid);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        AuthError::TokenInvalid
    })
}
