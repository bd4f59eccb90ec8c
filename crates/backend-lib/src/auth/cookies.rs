//! Cookie service: builds and clears the httpOnly auth cookies.
//!
//! Browsers on the same origin never see the bearer token in JavaScript; the
//! `token` cookie carries it instead and the `refresh` cookie carries the
//! long-lived refresh grant.
use crate::config::{AppEnvironment, Settings};
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};

/// Cookie name for the access token.
pub const ACCESS_COOKIE: &str = "token";
/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh";

/// Builds auth cookies for one deployment
#[derive(Debug, Clone)]
pub struct CookieFactory {
    domain: Option<String>,
    secure: bool,
}

impl CookieFactory {
    pub fn new(environment: AppEnvironment, domain: Option<String>) -> Self {
        Self {
            domain,
            secure: environment.is_production(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.environment, settings.cookie_domain.clone())
    }

    /// Whether cookies carry the `Secure` flag
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    fn same_site(&self) -> SameSite {
        if self.secure {
            SameSite::None
        } else {
            SameSite::Lax
        }
    }

    fn base(&self, name: &str, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::build((name.to_string(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site())
            .path("/")
            .build();
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }

    /// Cookie carrying `value` for `minutes`
    pub fn build(&self, name: &str, value: &str, minutes: i64) -> Cookie<'static> {
        let mut cookie = self.base(name, value.to_string());
        cookie.set_max_age(Duration::minutes(minutes));
        cookie
    }

    /// Cookie telling the client to drop `name`
    pub fn forget(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.base(name, String::new());
        cookie.set_max_age(Duration::minutes(-1));
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        cookie
    }
}
