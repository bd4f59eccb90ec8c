// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the TutorHub API server: sign-in,
//! refresh, logout and OTP password reset over httpOnly cookie bearer tokens.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod storage;
pub mod validation;

pub use router::create_router;

use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use tutorhub_common::Role;
use crate::auth::{
    validate_password_strength, AuthRateLimiter, AuthService, CookieFactory, DefaultAuth, OtpMailer,
    PasswordHasher, SessionManager, TokenHasher,
};
use crate::config::Settings;
use crate::error::AppError;
use crate::middleware::{prune_expired, RateLimitEntry};
use crate::storage::{NewUser, TokenStore, User, UserDirectory};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Session manager
    pub sessions: Arc<SessionManager>,
    /// User directory
    pub users: Arc<dyn UserDirectory>,
    /// Password hasher
    pub passwords: PasswordHasher,
    /// Loaded settings
    pub settings: Arc<Settings>,
    /// Per-client request counters
    pub rate_limits: Arc<DashMap<String, RateLimitEntry>>,
    /// Failed-login lockouts, shared with the auth service
    pub auth_rate_limiter: AuthRateLimiter,
}

impl AppState {
    /// Create a new application state over a storage backend
    pub fn new<S>(storage: S, config: Settings, mailer: Arc<dyn OtpMailer>) -> Result<Self, AppError>
    where
        S: UserDirectory + TokenStore + 'static,
    {
        if config.token_secret.is_empty() {
            return Err(AppError::Internal("token_secret is not configured".to_string()));
        }

        let storage = Arc::new(storage);
        let users: Arc<dyn UserDirectory> = storage.clone();
        let grants: Arc<dyn TokenStore> = storage;

        let hasher = TokenHasher::new(config.token_secret.expose().as_bytes())?;
        let sessions = SessionManager::new(grants, hasher, CookieFactory::from_settings(&config));
        let passwords = PasswordHasher::new(&config.password_hashing)?;
        let auth_rate_limiter = AuthRateLimiter::from_settings(&config.login_throttle);
        let auth = Arc::new(
            DefaultAuth::new(users.clone(), sessions.clone(), passwords.clone(), mailer, &config)
                .with_limiter(auth_rate_limiter.clone()),
        );

        Ok(Self {
            auth,
            sessions: Arc::new(sessions),
            users,
            passwords,
            settings: Arc::new(config),
            rate_limits: Arc::new(DashMap::new()),
            auth_rate_limiter,
        })
    }

    /// Forget request windows and login lockouts that have run out
    pub fn cleanup_rate_limits(&self) {
        let window = Duration::from_secs(self.settings.rate_limit.window_secs);
        let pruned = prune_expired(&self.rate_limits, window);
        self.auth_rate_limiter.cleanup();
        tracing::debug!(pruned, "rate limit cleanup");
    }

    /// Register a user with a hashed password.
    ///
    /// Teachers start unapproved; every other role may sign in right away.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AppError> {
        let email = validation::validate_email(email)?;
        if !validate_password_strength(password, &self.settings.password_requirements) {
            return Err(AppError::InvalidInput(format!(
                "Password must be at least {} characters and meet the complexity rules",
                self.settings.password_requirements.min_length
            )));
        }

        let password_hash = self.passwords.hash(password.to_string()).await?;
        let user = self
            .users
            .create_user(NewUser {
                name: name.trim().to_string(),
                email: email.to_string(),
                password_hash,
                role,
                accepted: role != Role::Teacher,
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "user created");
        Ok(user)
    }

    /// Create the configured super-admin unless that email is already taken
    pub async fn ensure_bootstrap_admin(&self) -> Result<Option<User>, AppError> {
        let Some(admin) = self.settings.bootstrap_admin.clone() else {
            return Ok(None);
        };
        if self.users.find_by_email(&admin.email).await?.is_some() {
            tracing::debug!(email = %admin.email, "bootstrap admin already present");
            return Ok(None);
        }

        let user = self
            .create_user(&admin.name, &admin.email, admin.password.expose(), Role::SuperAdmin)
            .await?;
        Ok(Some(user))
    }
}
