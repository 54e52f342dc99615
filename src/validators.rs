/// Login input validation
///
/// Format checks only. Whether the credentials are right is decided later,
/// and failures here never reveal anything about stored accounts.

use regex::Regex;
use lazy_static::lazy_static;

use crate::auth::LoginRequest;
use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_PASSWORD_LENGTH: usize = 128;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("email regex is valid");
}

/// Validates an email address and returns it trimmed
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email", MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email"));
    }

    Ok(trimmed.to_string())
}

/// Presence and length only; the password itself is never trimmed
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password"));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_LENGTH));
    }

    Ok(())
}

/// Returns the normalized email on success
pub fn validate_login_request(request: &LoginRequest) -> Result<String, ValidationError> {
    let email = is_valid_email(&request.email)?;
    is_valid_password(&request.password)?;
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_valid_email() {
        assert_eq!(is_valid_email("  a@x.com ").unwrap(), "a@x.com");
        assert!(is_valid_email("name.surname@example.co").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        for email in ["notanemail", "user@", "@example.com", "user@@example.com"] {
            assert!(is_valid_email(email).is_err(), "accepted {}", email);
        }
    }

    #[test]
    fn test_empty_email() {
        assert_eq!(is_valid_email("   "), Err(ValidationError::EmptyField("email")));
    }

    #[test]
    fn test_email_too_long() {
        let email = format!("{}@example.com", "a".repeat(250));
        assert_eq!(
            is_valid_email(&email),
            Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH))
        );
    }

    #[test]
    fn test_password_rules() {
        assert!(is_valid_password("x").is_ok());
        assert_eq!(is_valid_password(""), Err(ValidationError::EmptyField("password")));
        assert!(is_valid_password(&"a".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_login_request() {
        assert_eq!(validate_login_request(&request(" a@x.com", "pw")).unwrap(), "a@x.com");
        assert_eq!(
            validate_login_request(&request("a@x.com", "")).unwrap_err().field(),
            "password"
        );
        assert_eq!(validate_login_request(&request("", "pw")).unwrap_err().field(), "email");
    }
}
