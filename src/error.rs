/// Error Handling Module
///
/// Unified error handling for the authentication service:
/// 1. Domain-specific error types (validation, store, token, auth)
/// 2. A single application error used for control flow
/// 3. HTTP response mapping with a deliberately narrow client-facing surface
/// 4. Error context enrichment for structured logging

use actix_web::{error::ResponseError, http::StatusCode, HttpMessage, HttpResponse};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use crate::auth::AuthResponse;
use crate::logger::RequestId;

/// Shared by "unknown email" and "wrong password" so the two are indistinguishable.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

/// Returned when the request body cannot be decoded at all.
pub const MALFORMED_BODY_MESSAGE: &str = "Invalid JSON format";

/// Field key used for errors that belong to the whole form rather than one input.
pub const FORM_FIELD: &str = "form";

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request input
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MalformedBody(String),
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
}

impl ValidationError {
    /// Name of the input this error is attached to in the response `errors` map
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MalformedBody(_) => FORM_FIELD,
            ValidationError::EmptyField(field)
            | ValidationError::TooShort(field, _)
            | ValidationError::TooLong(field, _)
            | ValidationError::InvalidFormat(field) => field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MalformedBody(_) => write!(f, "{}", MALFORMED_BODY_MESSAGE),
            ValidationError::EmptyField(field) => write!(f, "{} is required", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Credential and token store failures
#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
    Query(String),
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
            StoreError::Query(msg) => write!(f, "Store query error: {}", msg),
            StoreError::Corrupt(msg) => write!(f, "Store returned corrupt data: {}", msg),
        }
    }
}

impl StdError for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// Access token signing failures
#[derive(Debug)]
pub enum TokenError {
    SigningKeyUnavailable,
    Encoding(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::SigningKeyUnavailable => write!(f, "Signing key is not configured"),
            TokenError::Encoding(msg) => write!(f, "Token encoding failed: {}", msg),
        }
    }
}

impl StdError for TokenError {}

/// Authentication errors
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Unknown email or wrong password. Never say which.
    InvalidCredentials,
    MissingToken,
    TokenInvalid,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "{}", INVALID_CREDENTIALS_MESSAGE),
            AuthError::MissingToken => write!(f, "Missing authentication token"),
            AuthError::TokenInvalid => write!(f, "Invalid or expired token"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Store(StoreError),
    Token(TokenError),
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::InvalidCredentials) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(_) | AppError::Token(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {}", err))
    }
}

/// ============================================================================
/// 3. HTTP RESPONSE MAPPING
/// ============================================================================

/// Converts errors into client-facing responses and internal log lines
pub trait ErrorHandler {
    fn error_response(&self, context: &ErrorContext) -> (StatusCode, AuthResponse);
    fn log_error(&self, context: &ErrorContext);
}

impl ErrorHandler for AppError {
    fn error_response(&self, context: &ErrorContext) -> (StatusCode, AuthResponse) {
        let status = self.status_code();
        let mut errors = HashMap::new();

        let message = match self {
            AppError::Validation(ValidationError::MalformedBody(_)) => {
                MALFORMED_BODY_MESSAGE.to_string()
            }
            AppError::Validation(e) => {
                errors.insert(e.field().to_string(), e.to_string());
                "Invalid input".to_string()
            }
            AppError::Auth(e) => {
                if *e == AuthError::InvalidCredentials {
                    errors.insert(FORM_FIELD.to_string(), e.to_string());
                }
                e.to_string()
            }
            // Internal detail stays in the logs.
            AppError::Store(_) | AppError::Token(_) | AppError::Internal(_) => {
                let message = format!("An error occurred during {}", context.operation);
                errors.insert(FORM_FIELD.to_string(), message.clone());
                message
            }
        };

        let mut body = AuthResponse::failure(message);
        if !errors.is_empty() {
            body.errors = Some(errors);
        }
        (status, body)
    }

    fn log_error(&self, context: &ErrorContext) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(
                    request_id = %context.request_id,
                    operation = %context.operation,
                    error = %e,
                    "Validation error"
                );
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(
                    request_id = %context.request_id,
                    operation = %context.operation,
                    "Invalid credentials attempt"
                );
            }
            AppError::Auth(e) => {
                tracing::warn!(
                    request_id = %context.request_id,
                    operation = %context.operation,
                    error = %e,
                    "Authentication error"
                );
            }
            AppError::Store(e) => {
                tracing::error!(
                    request_id = %context.request_id,
                    operation = %context.operation,
                    user_id = ?context.user_id,
                    error = %e,
                    timestamp = %context.timestamp.to_rfc3339(),
                    "Store error"
                );
            }
            AppError::Token(e) => {
                tracing::error!(
                    request_id = %context.request_id,
                    operation = %context.operation,
                    user_id = ?context.user_id,
                    error = %e,
                    timestamp = %context.timestamp.to_rfc3339(),
                    "Token signing error"
                );
            }
            AppError::Internal(msg) => {
                tracing::error!(
                    request_id = %context.request_id,
                    operation = %context.operation,
                    error = %msg,
                    timestamp = %context.timestamp.to_rfc3339(),
                    "Internal error"
                );
            }
        }
    }
}

/// ============================================================================
/// 4. ERROR CONTEXT ENRICHMENT
/// ============================================================================

/// Per-request context attached to errors for logging and response wording
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    /// Human-readable operation name, used in the generic 500 message
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Context carrying the id the request logger assigned, if it ran
    pub fn for_request<R: HttpMessage>(req: &R, operation: impl Into<String>) -> Self {
        let request_id = req.extensions().get::<RequestId>().map(|id| id.0.clone());
        match request_id {
            Some(request_id) => Self::new(operation).with_request_id(request_id),
            None => Self::new(operation),
        }
    }

    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Bind an error to this context so actix can render it
    pub fn fail(&self, error: impl Into<AppError>) -> RequestError {
        RequestError {
            context: self.clone(),
            error: error.into(),
        }
    }
}

/// An application error bound to the request it happened in
#[derive(Debug)]
pub struct RequestError {
    pub context: ErrorContext,
    pub error: AppError,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.context.operation, self.error)
    }
}

impl StdError for RequestError {}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        self.error.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        self.error.log_error(&self.context);
        let (status, body) = ErrorHandler::error_response(&self.error, &self.context);
        HttpResponse::build(status).json(body)
    }
}
