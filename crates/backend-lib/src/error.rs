// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Teacher account not yet approved")]
    AccountNotApproved,

    #[error("Refresh token missing")]
    MissingRefreshToken,

    #[error("Refresh token invalid")]
    InvalidRefreshToken,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("OTP expired")]
    OtpExpired,

    #[error("Please verify OTP first")]
    ResetNotAuthorized,

    #[error("Unknown email address")]
    UnknownEmail,

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::ResetNotAuthorized
            | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::AccountNotApproved | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::MissingRefreshToken
            | AppError::InvalidRefreshToken
            | AppError::RefreshTokenExpired
            | AppError::InvalidOtp
            | AppError::OtpExpired
            | AppError::UnknownEmail => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimitExceeded | AppError::AuthRateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            },
            AppError::Mail(_) | AppError::Internal(_) | AppError::Io(_) | AppError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "AUTH_001",
            AppError::AccountNotApproved => "AUTH_002",
            AppError::AuthRateLimited => "AUTH_003",
            AppError::Unauthenticated => "AUTH_004",
            AppError::Forbidden => "AUTH_005",
            AppError::MissingRefreshToken => "REFRESH_001",
            AppError::InvalidRefreshToken => "REFRESH_002",
            AppError::RefreshTokenExpired => "REFRESH_003",
            AppError::InvalidOtp => "OTP_001",
            AppError::OtpExpired => "OTP_002",
            AppError::ResetNotAuthorized => "RESET_001",
            AppError::UnknownEmail => "RESET_002",
            AppError::NotFound(_) => "NF_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::Mail(_) => "MAIL_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => "These credentials do not match our records".to_string(),
            AppError::AccountNotApproved => "Teacher account not yet approved.".to_string(),
            AppError::MissingRefreshToken | AppError::InvalidRefreshToken => "Invalid".to_string(),
            AppError::RefreshTokenExpired => "Refresh token expired".to_string(),
            AppError::InvalidOtp | AppError::UnknownEmail => "Invalid".to_string(),
            AppError::OtpExpired => "OTP expired".to_string(),
            AppError::ResetNotAuthorized => "Please verify OTP first".to_string(),
            AppError::Unauthenticated => "Unauthenticated".to_string(),
            AppError::Forbidden => "Forbidden".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::AuthRateLimited => {
                "Too many authentication attempts, please try again later".to_string()
            },
            AppError::RateLimitExceeded => {
                "Rate limit exceeded, please try again later".to_string()
            },
            AppError::Mail(_) | AppError::Internal(_) | AppError::Io(_) => {
                "An internal server error occurred".to_string()
            },
            AppError::Json(_) => "Invalid request format".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "message": message,
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {err}"))
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
