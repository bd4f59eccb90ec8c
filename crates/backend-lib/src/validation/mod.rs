// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request validation module.

use crate::auth::validate_password_strength;
use crate::config::PasswordRequirements;
use crate::error::AppError;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tutorhub_common::{LoginRequest, ResetPasswordRequest};

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_PASSWORD_LENGTH: usize = 128;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email pattern")
});

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid OTP: {0}")]
    InvalidOtp(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "Email must not be empty".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email must not exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Email format is invalid".to_string(),
        ));
    }

    Ok(email)
}

/// Validate a login request
pub fn validate_login(request: &LoginRequest) -> ValidationResult<()> {
    validate_email(&request.email)?;

    if request.password.is_empty() {
        return Err(ValidationError::InvalidPassword(
            "Password is required".to_string(),
        ));
    }

    if request.password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must not exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Validate a submitted OTP.
///
/// Only presence is checked here. A malformed code simply matches nobody.
pub fn validate_otp(otp: &str) -> ValidationResult<&str> {
    let otp = otp.trim();

    if otp.is_empty() {
        return Err(ValidationError::InvalidOtp("OTP is required".to_string()));
    }

    Ok(otp)
}

/// Validate a password reset request
pub fn validate_reset_password(
    request: &ResetPasswordRequest,
    requirements: &PasswordRequirements,
) -> ValidationResult<()> {
    validate_email(&request.email)?;

    if request.new_password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must not exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    if !validate_password_strength(&request.new_password, requirements) {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at least {} characters and meet the complexity rules",
            requirements.min_length
        )));
    }

    if request.confirm_password != request.new_password {
        return Err(ValidationError::InvalidPassword(
            "Password confirmation does not match".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@x.com").is_ok());
        assert_eq!(validate_email("  a@x.com ").unwrap(), "a@x.com");
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@x").is_err());

        let long = format!("{}@x.com", "a".repeat(MAX_EMAIL_LENGTH));
        assert!(validate_email(&long).is_err());
    }

    #[test]
    fn test_validate_login() {
        let mut request = LoginRequest {
            email: "a@x.com".to_string(),
            password: "secret123".to_string(),
            remember: None,
        };
        assert!(validate_login(&request).is_ok());

        request.password.clear();
        assert!(matches!(
            validate_login(&request),
            Err(ValidationError::InvalidPassword(_))
        ));
    }

    #[test]
    fn test_validate_otp() {
        assert_eq!(validate_otp("123456").unwrap(), "123456");
        assert_eq!(validate_otp(" 123456 ").unwrap(), "123456");
        assert!(validate_otp("").is_err());
        assert!(validate_otp("   ").is_err());
        // Wrong shape is left to the lookup
        assert_eq!(validate_otp("12345").unwrap(), "12345");
    }

    #[test]
    fn test_validate_reset_password() {
        let requirements = PasswordRequirements::default();
        let mut request = ResetPasswordRequest {
            email: "a@x.com".to_string(),
            new_password: "brand-new-pass".to_string(),
            confirm_password: "brand-new-pass".to_string(),
        };
        assert!(validate_reset_password(&request, &requirements).is_ok());

        request.confirm_password = "different-pass".to_string();
        assert!(validate_reset_password(&request, &requirements).is_err());

        request.new_password = "short".to_string();
        request.confirm_password = "short".to_string();
        assert!(validate_reset_password(&request, &requirements).is_err());
    }

    #[test]
    fn test_validation_error_maps_to_invalid_input() {
        let err: AppError = ValidationError::InvalidOtp("OTP is required".to_string()).into();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
