// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
//! Secure token generation for authentication.
//!
//! Cryptographically secure material for bearer grants and password-reset
//! one-time passcodes.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, Rng, RngCore};

/// Default token size in bytes (32 bytes = 256 bits of entropy)
const DEFAULT_TOKEN_BYTES: usize = 32;

/// Smallest and largest six-digit OTP
const OTP_MIN: u32 = 100_000;
const OTP_MAX: u32 = 999_999;

/** Generate a cryptographically secure random token
This uses OS-provided entropy to create a secure random token
that is suitable as an opaque bearer credential.
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token() -> String {
    generate_secure_token_with_size(DEFAULT_TOKEN_BYTES)
}

/** Generate a cryptographically secure random token with specified size
# Arguments
* `bytes` - The size of the random token in bytes
# Returns
A base64 URL-safe encoded string without padding */
fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// Generate a six-digit OTP, uniform over 100000..=999999
pub fn generate_otp() -> String {
    OsRng.gen_range(OTP_MIN..=OTP_MAX).to_string()
}
