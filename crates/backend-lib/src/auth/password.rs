// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use crate::config::{PasswordHashing, PasswordRequirements};
use crate::error::AppError;
use scrypt::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Params, Scrypt,
};
use zeroize::Zeroize;

/// Hash a password using scrypt with the given cost parameters
pub fn hash_password(plain: &str, params: Params) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)?
        .to_string();
    Ok(hash)
}

/// Verify a password against a hash
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    if password.chars().count() < requirements.min_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}

/// scrypt hashing off the async executor.
///
/// Hashing is deliberately slow, so both directions run on the blocking pool.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Build a hasher from configured cost parameters
    pub fn new(config: &PasswordHashing) -> Result<Self, AppError> {
        let params = Params::new(config.log_n, config.r, config.p, Params::RECOMMENDED_LEN)
            .map_err(|e| AppError::Internal(format!("invalid scrypt parameters: {e}")))?;
        Ok(Self { params })
    }

    /// Hash a password, wiping the plaintext copy afterwards
    pub async fn hash(&self, mut plain: String) -> Result<String, AppError> {
        let params = self.params.clone();
        let hash = tokio::task::spawn_blocking(move || {
            let hash = hash_password(&plain, params);
            plain.zeroize();
            hash
        })
        .await?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;
        Ok(hash)
    }

    /// Verify a password against a stored hash
    pub async fn verify(&self, hash: String, mut plain: String) -> Result<bool, AppError> {
        let ok = tokio::task::spawn_blocking(move || {
            let ok = verify_password(&hash, &plain);
            plain.zeroize();
            ok
        })
        .await?;
        Ok(ok)
    }
}
