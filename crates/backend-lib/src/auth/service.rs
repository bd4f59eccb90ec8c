use super::{IssuedToken, Principal};
use crate::error::AppError;
use crate::storage::User;
use async_trait::async_trait;
use tutorhub_common::{ApplicationStatus, LoginRequest, ResetPasswordRequest, UserId};

/// Grants handed out by a successful login or refresh
#[derive(Debug)]
pub struct SessionGrant {
    pub user: User,
    pub access: IssuedToken,
    /// Present only for remembered logins
    pub refresh: Option<IssuedToken>,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Check credentials and issue an access grant, plus a refresh grant when
    /// the caller asked to be remembered.
    async fn login(&self, request: &LoginRequest, client: &str) -> Result<SessionGrant, AppError>;

    /// Trade a live refresh grant for a new access grant.
    async fn refresh(&self, refresh_token: Option<&str>) -> Result<SessionGrant, AppError>;

    /// Revoke whatever the caller presented. Never fails.
    async fn logout(
        &self,
        current: Option<&Principal>,
        access_cookie: Option<&str>,
        refresh_cookie: Option<&str>,
    );

    async fn forgot_password(&self, email: &str) -> Result<(), AppError>;

    async fn resend_otp(&self, email: &str) -> Result<(), AppError>;

    /// Consume a reset code and issue the access grant that authorizes the reset.
    async fn verify_otp(&self, otp: &str) -> Result<IssuedToken, AppError>;

    async fn reset_password(
        &self,
        credential: Option<&str>,
        request: &ResetPasswordRequest,
    ) -> Result<(), AppError>;

    /// Resolve a bearer credential to the calling user.
    async fn authenticate(&self, credential: &str) -> Result<Principal, AppError>;

    async fn review_application(
        &self,
        reviewer: &Principal,
        user_id: UserId,
        status: ApplicationStatus,
    ) -> Result<User, AppError>;
}
