// ============================
// crates/backend-lib/src/storage/mod.rs
// ============================
//! Storage abstraction for the user directory and the token store.
//!
//! Both are external collaborators of the session manager: the directory
//! owns user rows (password hash, role, approval flag, reset OTP fields) and
//! the token store owns issued grants, keyed by the digest of their plaintext.
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tutorhub_common::{Role, UserId, UserProfile};

mod flat_file;
mod memory;

pub use flat_file::FlatFileStorage;
pub use memory::{MemoryStore, Snapshot};

/// Grant identifier type
pub type GrantId = u64;

/// A user row
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// scrypt PHC string
    pub password_hash: String,
    pub role: Role,
    /// Teachers need approval before they can log in
    pub accepted: bool,
    pub reset_otp: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public profile fields
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }

    /// Whether the login path may hand this user a session
    pub fn can_log_in(&self) -> bool {
        self.role != Role::Teacher || self.accepted
    }
}

// Keeps hashes and OTPs out of log lines
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("accepted", &self.accepted)
            .field("reset_pending", &self.reset_otp.is_some())
            .finish_non_exhaustive()
    }
}

/// Fields for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub accepted: bool,
}

/// Kind of an issued grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    AccessToken,
    RefreshToken,
}

impl TokenKind {
    /// Stored name of the kind
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::AccessToken => "access-token",
            TokenKind::RefreshToken => "refresh-token",
        }
    }

    /// Name of the cookie carrying grants of this kind
    pub fn cookie_name(self) -> &'static str {
        match self {
            TokenKind::AccessToken => crate::auth::ACCESS_COOKIE,
            TokenKind::RefreshToken => crate::auth::REFRESH_COOKIE,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issued bearer credential. Only the digest of the plaintext is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub id: GrantId,
    pub token_hash: String,
    pub user_id: UserId,
    pub kind: TokenKind,
    /// `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AccessGrant {
    /// Whether the grant has a non-null expiry that is not in the future
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Fields for storing a grant
#[derive(Debug, Clone)]
pub struct NewGrant {
    pub token_hash: String,
    pub user_id: UserId,
    pub kind: TokenKind,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Trait for user directory backends
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create a user; fails when the email is taken
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    /// Look a user up by id
    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError>;

    /// Look a user up by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Find the user currently holding this reset OTP
    async fn find_by_reset_otp(&self, otp: &str) -> Result<Option<User>, AppError>;

    /// Store a reset OTP and its expiry in one update, replacing any previous
    /// one. Returns `false` without writing when another user holds the same
    /// code.
    async fn assign_reset_otp(
        &self,
        id: UserId,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Clear the OTP fields if they still hold `otp`. Returns whether they did.
    async fn consume_reset_otp(&self, id: UserId, otp: &str) -> Result<bool, AppError>;

    /// Overwrite the password hash and clear the OTP fields in one update
    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), AppError>;

    /// Set the approval flag
    async fn set_accepted(&self, id: UserId, accepted: bool) -> Result<(), AppError>;
}

/// Trait for token store backends
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a new grant
    async fn insert_grant(&self, grant: NewGrant) -> Result<AccessGrant, AppError>;

    /// Look a grant up by the digest of its plaintext
    async fn find_grant(&self, token_hash: &str) -> Result<Option<AccessGrant>, AppError>;

    /// Delete a grant. Returns whether a row was removed; deleting a missing
    /// grant is not an error.
    async fn delete_grant(&self, token_hash: &str) -> Result<bool, AppError>;

    /// Delete every grant owned by a user, returning how many were removed
    async fn delete_user_grants(&self, user_id: UserId) -> Result<usize, AppError>;
}

/// Normalized form of an email used for lookups
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
