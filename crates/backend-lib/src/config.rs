// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

/// Environment variable prefix, e.g. `TUTORHUB_TOKENS__ACCESS_TTL_MINUTES`
pub const ENV_PREFIX: &str = "TUTORHUB_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Data directory path
    pub data_dir: PathBuf,
    /// Log level
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Deployment environment
    pub environment: AppEnvironment,
    /// Domain attribute of auth cookies
    pub cookie_domain: Option<String>,
    /// Key for hashing issued tokens
    pub token_secret: SecretKey,
    /// Token and OTP lifetimes
    pub tokens: TokenSettings,
    /// Password requirements
    pub password_requirements: PasswordRequirements,
    /// scrypt cost parameters
    pub password_hashing: PasswordHashing,
    /// Request rate limiting
    pub rate_limit: RateLimitSettings,
    /// Failed-login lockout
    pub login_throttle: LoginThrottleSettings,
    /// Initial super-admin, created when the directory has no such account
    pub bootstrap_admin: Option<BootstrapAdmin>,
    /// Delivery of password-reset codes
    pub mail: MailSettings,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Local,
    Testing,
    Staging,
    Production,
}

impl AppEnvironment {
    /// Production cookies are `Secure` and `SameSite=None`
    pub fn is_production(self) -> bool {
        self == AppEnvironment::Production
    }
}

/// Token and OTP lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Access token lifetime in minutes
    pub access_ttl_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_ttl_days: i64,
    /// Password-reset OTP lifetime in minutes
    pub otp_ttl_minutes: i64,
}

/// Password complexity requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordRequirements {
    /// Minimum password length
    pub min_length: usize,
    /// Require uppercase letters
    pub require_uppercase: bool,
    /// Require lowercase letters
    pub require_lowercase: bool,
    /// Require digits
    pub require_digit: bool,
    /// Require special characters
    pub require_special: bool,
}

/// scrypt parameters for new password hashes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordHashing {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

/// Per-client request budget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Length of the counting window
    pub window_secs: u64,
    /// Requests allowed per window
    pub max_requests: u32,
}

/// Failed-login lockout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginThrottleSettings {
    pub max_attempts: u32,
    pub lockout_secs: u64,
}

/// How reset codes leave the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Log the delivery without the code
    Log,
    Smtp,
}

/// Connection security for the SMTP relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// TLS from the first byte, usually port 465
    Tls,
    /// Upgrade with STARTTLS, usually port 587
    StartTls,
    /// Plaintext, for a local relay only
    None,
}

/// Outgoing mail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub transport: MailTransport,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub security: SmtpSecurity,
    pub username: Option<String>,
    pub password: Option<SecretKey>,
    /// `From` mailbox, e.g. `TutorHub <no-reply@tutorhub.test>`
    pub from: String,
    /// Name used in the message body
    pub app_name: String,
}

/// Super-admin account created on first start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub name: String,
    pub password: SecretKey,
}

/// A secret string: redacted in `Debug`, wiped on drop
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([redacted])")
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            log_json: false,
            environment: AppEnvironment::Local,
            cookie_domain: None,
            token_secret: SecretKey::default(),
            tokens: TokenSettings::default(),
            password_requirements: PasswordRequirements::default(),
            password_hashing: PasswordHashing::default(),
            rate_limit: RateLimitSettings::default(),
            login_throttle: LoginThrottleSettings::default(),
            bootstrap_admin: None,
            mail: MailSettings::default(),
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            transport: MailTransport::Log,
            smtp_host: String::new(),
            smtp_port: 587,
            security: SmtpSecurity::StartTls,
            username: None,
            password: None,
            from: String::new(),
            app_name: "TutorHub".to_string(),
        }
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl_minutes: 60 * 24, // 1 day
            refresh_ttl_days: 30,
            otp_ttl_minutes: 10,
        }
    }
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

impl Default for PasswordHashing {
    fn default() -> Self {
        Self { log_n: 15, r: 8, p: 1 }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 120,
        }
    }
}

impl Default for LoginThrottleSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 5 * 60,
        }
    }
}

impl Settings {
    /// Load settings from the default config files and the environment
    pub fn load() -> Result<Self> {
        load_settings()
    }

    /// Load settings from an explicit config file, then the environment
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let figment = Figment::from(Serialized::defaults(Settings::default()));
        let figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Toml::file(path)),
        };
        let settings: Settings = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings for values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!("invalid log level: {}", self.log_level);
        }
        if self.tokens.access_ttl_minutes <= 0
            || self.tokens.refresh_ttl_days <= 0
            || self.tokens.otp_ttl_minutes <= 0
        {
            bail!("token lifetimes must be positive");
        }
        if self.password_requirements.min_length < 8 {
            bail!("minimum password length must be at least 8");
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            bail!("rate limit window and budget must be positive");
        }
        if self.login_throttle.max_attempts == 0 {
            bail!("login throttle needs at least one attempt");
        }
        if self.environment.is_production() && self.token_secret.expose().len() < 32 {
            bail!("token_secret must be at least 32 bytes in production");
        }
        if self.mail.transport == MailTransport::Smtp {
            if self.mail.smtp_host.is_empty() || self.mail.from.is_empty() {
                bail!("smtp mail needs smtp_host and from");
            }
            if self.mail.username.is_some() != self.mail.password.is_some() {
                bail!("smtp username and password go together");
            }
        }
        Ok(())
    }
}

/// Load settings from various sources
pub fn load_settings() -> Result<Settings> {
    // Defaults first, then config files, then environment variables
    let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
        .merge(Toml::file("config.toml"))
        .merge(Yaml::file("config.yaml"))
        .merge(Json::file("config.json"))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;

    settings.validate()?;
    Ok(settings)
}
