use super::{
    authorize,
    token_generator::{generate_otp, generate_secure_token}, AuthRateLimiter, AuthService, IssuedToken,
    OtpMailer, PasswordHasher, Principal, SessionGrant, SessionManager, SUPER_ADMIN,
};
use crate::config::{PasswordRequirements, Settings, TokenSettings};
use crate::error::AppError;
use crate::metrics::{LOGIN_FAILURE, LOGIN_SUCCESS, OTP_ISSUED, PASSWORD_RESET, TOKEN_REFRESHED};
use crate::storage::{TokenKind, User, UserDirectory};
use crate::validation;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use metrics::counter;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use tutorhub_common::{ApplicationStatus, LoginRequest, ResetPasswordRequest, Role, UserId};

/// Draws before giving up on finding a reset code nobody else holds
const MAX_OTP_DRAWS: usize = 16;

pub struct DefaultAuth {
    users: Arc<dyn UserDirectory>,
    sessions: SessionManager,
    passwords: PasswordHasher,
    mailer: Arc<dyn OtpMailer>,
    limiter: AuthRateLimiter,
    tokens: TokenSettings,
    requirements: PasswordRequirements,
    /// Verified against when the email is unknown, so both paths pay for scrypt
    decoy_hash: OnceCell<String>,
}

impl DefaultAuth {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: SessionManager,
        passwords: PasswordHasher,
        mailer: Arc<dyn OtpMailer>,
        settings: &Settings,
    ) -> Self {
        Self {
            users,
            sessions,
            passwords,
            mailer,
            limiter: AuthRateLimiter::from_settings(&settings.login_throttle),
            tokens: settings.tokens.clone(),
            requirements: settings.password_requirements.clone(),
            decoy_hash: OnceCell::new(),
        }
    }

    /// Share a limiter with the caller, which then owns its cleanup
    pub fn with_limiter(mut self, limiter: AuthRateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    fn access_expiry(&self) -> chrono::DateTime<Utc> {
        Utc::now() + Duration::minutes(self.tokens.access_ttl_minutes)
    }

    async fn issue_access(&self, user: &User) -> Result<IssuedToken, AppError> {
        self.sessions
            .issue(user, TokenKind::AccessToken, self.access_expiry())
            .await
    }

    async fn decoy_hash(&self) -> Result<String, AppError> {
        let hash = self
            .decoy_hash
            .get_or_try_init(|| self.passwords.hash(generate_secure_token()))
            .await?;
        Ok(hash.clone())
    }

    async fn user_by_email(&self, email: &str) -> Result<User, AppError> {
        let email = validation::validate_email(email)?;
        self.users
            .find_by_email(email)
            .await?
            .ok_or(AppError::UnknownEmail)
    }

    /// Store a fresh reset code for `user` and mail it.
    ///
    /// A code already held by another user is never handed out, so the
    /// lookup by code stays unambiguous.
    async fn send_reset_code(&self, user: &User) -> Result<(), AppError> {
        let expires_at = Utc::now() + Duration::minutes(self.tokens.otp_ttl_minutes);

        let mut assigned = None;
        for _ in 0..MAX_OTP_DRAWS {
            let otp = generate_otp();
            if self.users.assign_reset_otp(user.id, &otp, expires_at).await? {
                assigned = Some(otp);
                break;
            }
            debug!(user_id = user.id, "reset code already in use, drawing again");
        }
        let otp = assigned
            .ok_or_else(|| AppError::Internal("could not allocate a unique reset code".into()))?;

        self.mailer.send_reset_otp(&user.email, &otp).await?;
        counter!(OTP_ISSUED).increment(1);
        info!(user_id = user.id, "reset code sent");
        Ok(())
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn login(&self, request: &LoginRequest, client: &str) -> Result<SessionGrant, AppError> {
        validation::validate_login(request)?;

        let key = AuthRateLimiter::throttle_key(&request.email, client);
        if !self.limiter.check_rate_limit(&key) {
            counter!(LOGIN_FAILURE, "reason" => "throttled").increment(1);
            return Err(AppError::AuthRateLimited);
        }

        let found = self.users.find_by_email(&request.email).await?;
        let verified = match &found {
            Some(user) => {
                self.passwords
                    .verify(user.password_hash.clone(), request.password.clone())
                    .await?
            },
            None => {
                let decoy = self.decoy_hash().await?;
                self.passwords.verify(decoy, request.password.clone()).await?;
                false
            },
        };

        // Unknown email and wrong password look the same to the caller
        let user = match found {
            Some(user) if verified => user,
            _ => {
                self.limiter.record_failed_attempt(&key);
                counter!(LOGIN_FAILURE, "reason" => "credentials").increment(1);
                info!(%client, "login rejected");
                return Err(AppError::InvalidCredentials);
            },
        };
        self.limiter.record_success(&key);

        if !user.can_log_in() {
            counter!(LOGIN_FAILURE, "reason" => "not_approved").increment(1);
            warn!(user_id = user.id, "login by teacher awaiting approval");
            return Err(AppError::AccountNotApproved);
        }

        let access = self.issue_access(&user).await?;
        let remember = request.remember.unwrap_or(false);
        let refresh = if remember {
            let expires_at = Utc::now() + Duration::days(self.tokens.refresh_ttl_days);
            Some(
                self.sessions
                    .issue(&user, TokenKind::RefreshToken, expires_at)
                    .await?,
            )
        } else {
            None
        };

        counter!(LOGIN_SUCCESS).increment(1);
        info!(user_id = user.id, role = %user.role, remember, "login succeeded");

        Ok(SessionGrant {
            user,
            access,
            refresh,
        })
    }

    async fn refresh(&self, refresh_token: Option<&str>) -> Result<SessionGrant, AppError> {
        let plaintext = refresh_token
            .filter(|token| !token.is_empty())
            .ok_or(AppError::MissingRefreshToken)?;

        let grant = self
            .sessions
            .find_by_plaintext(plaintext)
            .await?
            .filter(|grant| grant.kind == TokenKind::RefreshToken)
            .ok_or(AppError::InvalidRefreshToken)?;

        if grant.is_expired_at(Utc::now()) {
            self.sessions.delete_grant(&grant).await?;
            debug!(user_id = grant.user_id, "expired refresh grant removed");
            return Err(AppError::RefreshTokenExpired);
        }

        let user = self
            .users
            .find_user(grant.user_id)
            .await?
            .ok_or(AppError::InvalidRefreshToken)?;

        // The refresh grant is left in place and may be used again
        let access = self.issue_access(&user).await?;
        counter!(TOKEN_REFRESHED).increment(1);
        info!(user_id = user.id, "access grant refreshed");

        Ok(SessionGrant {
            user,
            access,
            refresh: None,
        })
    }

    async fn logout(
        &self,
        current: Option<&Principal>,
        access_cookie: Option<&str>,
        refresh_cookie: Option<&str>,
    ) {
        if let Some(principal) = current {
            if let Err(e) = self.sessions.delete_grant(&principal.grant).await {
                warn!(error = %e, user_id = principal.user.id, "failed to revoke current grant");
            }
        }
        for presented in [access_cookie, refresh_cookie] {
            if let Err(e) = self.sessions.revoke(presented).await {
                warn!(error = %e, "failed to revoke cookie grant");
            }
        }
        debug!(
            user_id = current.map(|p| p.user.id),
            "logout completed"
        );
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let user = self.user_by_email(email).await?;
        self.send_reset_code(&user).await
    }

    async fn resend_otp(&self, email: &str) -> Result<(), AppError> {
        let user = self.user_by_email(email).await?;
        self.send_reset_code(&user).await
    }

    async fn verify_otp(&self, otp: &str) -> Result<IssuedToken, AppError> {
        let otp = validation::validate_otp(otp)?;

        let user = self
            .users
            .find_by_reset_otp(otp)
            .await?
            .ok_or(AppError::InvalidOtp)?;

        let live = user
            .reset_expires_at
            .is_some_and(|expires_at| expires_at > Utc::now());
        if !live {
            return Err(AppError::OtpExpired);
        }

        // Whoever clears the code first wins; a concurrent verify sees it gone
        if !self.users.consume_reset_otp(user.id, otp).await? {
            return Err(AppError::InvalidOtp);
        }

        let issued = self.issue_access(&user).await?;
        info!(user_id = user.id, "reset code verified");
        Ok(issued)
    }

    async fn reset_password(
        &self,
        credential: Option<&str>,
        request: &ResetPasswordRequest,
    ) -> Result<(), AppError> {
        validation::validate_reset_password(request, &self.requirements)?;
        let user = self.user_by_email(&request.email).await?;

        let grant = match credential {
            Some(credential) => self.sessions.find_by_plaintext(credential).await?,
            None => None,
        };
        let now = Utc::now();
        let grant = grant
            .filter(|grant| {
                grant.kind == TokenKind::AccessToken
                    && grant.user_id == user.id
                    && !grant.is_expired_at(now)
            })
            .ok_or(AppError::ResetNotAuthorized)?;

        let hash = self.passwords.hash(request.new_password.clone()).await?;

        // The grant authorizes exactly one reset
        if !self.sessions.delete_grant(&grant).await? {
            return Err(AppError::ResetNotAuthorized);
        }
        if let Err(e) = self.users.update_password(user.id, &hash).await {
            // The password did not change, so the credential is still good
            if let Err(restore) = self.sessions.reinstate(&grant).await {
                warn!(error = %restore, user_id = user.id, "could not reinstate reset grant");
            }
            return Err(e);
        }

        counter!(PASSWORD_RESET).increment(1);
        info!(user_id = user.id, "password reset");
        Ok(())
    }

    async fn authenticate(&self, credential: &str) -> Result<Principal, AppError> {
        let grant = self
            .sessions
            .find_by_plaintext(credential)
            .await?
            .filter(|grant| grant.kind == TokenKind::AccessToken)
            .ok_or(AppError::Unauthenticated)?;

        if grant.is_expired_at(Utc::now()) {
            return Err(AppError::Unauthenticated);
        }

        let user = self
            .users
            .find_user(grant.user_id)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        // A reset grant held by an unapproved teacher only reaches reset_password
        if !user.can_log_in() {
            debug!(user_id = user.id, "grant held by unapproved account");
            return Err(AppError::Unauthenticated);
        }

        Ok(Principal { user, grant })
    }

    async fn review_application(
        &self,
        reviewer: &Principal,
        user_id: UserId,
        status: ApplicationStatus,
    ) -> Result<User, AppError> {
        authorize(reviewer, SUPER_ADMIN)?;

        let mut teacher = self
            .users
            .find_user(user_id)
            .await?
            .filter(|user| user.role == Role::Teacher)
            .ok_or_else(|| AppError::NotFound(format!("teacher application {user_id}")))?;

        let accepted = status == ApplicationStatus::Approved;
        self.users.set_accepted(teacher.id, accepted).await?;
        teacher.accepted = accepted;

        if !accepted {
            self.sessions.revoke_all(&teacher).await?;
        }

        info!(
            reviewer_id = reviewer.user.id,
            teacher_id = teacher.id,
            ?status,
            "teacher application reviewed"
        );
        Ok(teacher)
    }
}
