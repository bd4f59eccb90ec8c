// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Rate limiting for login attempts.

use crate::config::LoginThrottleSettings;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of failed attempts before rate limiting
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration (5 minutes)
const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Entry in the rate limit map
#[derive(Debug, Clone)]
struct RateLimitEntry {
    /// Number of failed attempts
    failed_attempts: u32,
    /// Time of the last failed attempt
    last_failure: Instant,
    /// When the lockout expires
    lockout_expiry: Option<Instant>,
}

/// Rate limiter for login attempts, keyed by `email|client`
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    /// Map of throttle keys to rate limit entries
    attempts: Arc<DashMap<String, RateLimitEntry>>,
    /// Maximum number of failed attempts before lockout
    max_attempts: u32,
    /// Duration of lockout period
    lockout_duration: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_DURATION)
    }
}

impl AuthRateLimiter {
    /// Create a new auth rate limiter
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            lockout_duration,
        }
    }

    pub fn from_settings(settings: &LoginThrottleSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_secs(settings.lockout_secs),
        )
    }

    /// Throttle key for a login attempt
    pub fn throttle_key(email: &str, client: &str) -> String {
        format!("{}|{client}", email.trim().to_lowercase())
    }

    /// Record a failed authentication attempt
    pub fn record_failed_attempt(&self, key: &str) {
        let now = Instant::now();

        let mut entry = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                failed_attempts: 0,
                last_failure: now,
                lockout_expiry: None,
            });

        // Start over once a previous lockout has run out
        if entry.lockout_expiry.is_some_and(|expiry| now >= expiry) {
            entry.failed_attempts = 0;
            entry.lockout_expiry = None;
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_attempts && entry.lockout_expiry.is_none() {
            entry.lockout_expiry = Some(now + self.lockout_duration);
            tracing::warn!(
                attempts = entry.failed_attempts,
                lockout_secs = self.lockout_duration.as_secs(),
                "login locked out"
            );
        }
    }

    /// Record a successful authentication
    pub fn record_success(&self, key: &str) {
        self.attempts.remove(key);
    }

    /// Check if a key is allowed to attempt authentication
    pub fn check_rate_limit(&self, key: &str) -> bool {
        match self.attempts.get(key) {
            Some(entry) => match entry.lockout_expiry {
                Some(expiry) => Instant::now() >= expiry,
                None => true,
            },
            None => true,
        }
    }

    /// Whether any state is held for `key`
    pub fn is_tracked(&self, key: &str) -> bool {
        self.attempts.contains_key(key)
    }

    /// Clean up expired lockouts and stale entries
    pub fn cleanup(&self) {
        let now = Instant::now();

        self.attempts.retain(|_, entry| {
            if let Some(expiry) = entry.lockout_expiry {
                return now < expiry;
            }

            // Otherwise, keep entries for a day
            now.duration_since(entry.last_failure) < Duration::from_secs(24 * 60 * 60)
        });
    }
}
