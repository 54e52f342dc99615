/// Authentication module
///
/// Access token signing/validation, password verification, refresh token
/// issuing and revocation, the refresh cookie, and the flows that tie them
/// together.

mod claims;
mod cookie;
mod issuer;
mod jwt;
mod models;
mod password;
mod service;

pub use claims::Claims;
pub use cookie::SessionCookies;
pub use issuer::{generate_refresh_token, hash_token, TokenIssuer};
pub use jwt::{generate_access_token, validate_access_token};
pub use models::{
    AccessToken, AuthResponse, ClientContext, LoginOutcome, LoginRequest, RefreshToken,
    SessionResponse,
};
pub use password::{hash_password, verify_password, PasswordVerifier};
pub use service::{AuthService, RevocationFailureHook};
