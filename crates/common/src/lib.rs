// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! exchanged between `TutorHub` clients and the backend.
//! This module defines the JSON bodies of the authentication API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User identifier type
pub type UserId = u64;

/// Role of an account in the back office
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Full access, reviews teacher applications
    SuperAdmin,
    /// Manages teachers and classes
    Admin,
    /// Needs approval before being able to log in
    Teacher,
}

impl Role {
    /// Wire representation of the role
    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super-admin",
            Role::Admin => "admin",
            Role::Teacher => "teacher",
        }
    }

    /// Whether this role is part of `allowed`
    pub fn is_one_of(self, allowed: &[Role]) -> bool {
        allowed.contains(&self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super-admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Public profile fields of a user. Never carries the password hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// `POST auth/login`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Also issue a refresh token
    #[serde(default)]
    pub remember: Option<bool>,
}

/// Body of `POST auth/login` and `GET auth/refresh`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Access token plaintext
    pub token: String,
}

/// Body of `DELETE auth/logout`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

/// `POST auth/forgot-password` and `POST auth/resend-otp`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmailRequest {
    pub email: String,
}

/// `POST auth/verify-otp`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyOtpRequest {
    pub otp: String,
}

/// Body of a successful `POST auth/verify-otp`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OtpVerifiedResponse {
    pub message: String,
    /// Temporary credential authorizing the password reset
    pub token: String,
}

/// `POST auth/reset-password`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Generic `{ "message": ... }` body
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of a teacher application review
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Approved,
    Rejected,
    Pending,
}

/// `PATCH teacher-applications/{id}`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApplicationReviewRequest {
    pub status: ApplicationStatus,
}

/// Body of a successful application review
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApplicationReviewResponse {
    pub message: String,
    pub user: UserProfile,
    pub accepted: bool,
}

/// `GET health`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
