// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod authorize;
pub mod cookies;
pub mod digest;
pub mod mailer;
pub mod password;
pub mod rate_limit;
pub mod session;
pub mod token_generator;
mod service;
mod service_impl;

pub use authorize::{authorize, Principal, SUPER_ADMIN};
pub use cookies::{CookieFactory, ACCESS_COOKIE, REFRESH_COOKIE};
pub use digest::TokenHasher;
pub use mailer::{mailer_from_settings, LogMailer, OtpMailer, RecordingMailer, SmtpMailer};
pub use password::{hash_password, validate_password_strength, verify_password, PasswordHasher};
pub use rate_limit::AuthRateLimiter;
pub use service::{AuthService, SessionGrant};
pub use service_impl::DefaultAuth;
pub use session::{cookie_minutes, IssuedToken, SessionManager};
