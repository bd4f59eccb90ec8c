// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const LOGIN_SUCCESS: &str = "auth.login.success";
pub const LOGIN_FAILURE: &str = "auth.login.failure";
pub const TOKEN_ISSUED: &str = "token.issued";
pub const TOKEN_REVOKED: &str = "token.revoked";
pub const TOKEN_REFRESHED: &str = "token.refreshed";
pub const OTP_ISSUED: &str = "otp.issued";
pub const PASSWORD_RESET: &str = "password.reset";
