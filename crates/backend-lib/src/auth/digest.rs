//! Keyed digests of token plaintexts.
use crate::error::AppError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over token plaintexts.
///
/// The token store is only ever handed the hex digest, so a leaked store
/// cannot be replayed without the key.
#[derive(Clone)]
pub struct TokenHasher {
    mac: HmacSha256,
}

impl TokenHasher {
    pub fn new(key: &[u8]) -> Result<Self, AppError> {
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| AppError::Internal(format!("invalid token key: {e}")))?;
        Ok(Self { mac })
    }

    /// Hex digest of a plaintext
    pub fn digest(&self, plaintext: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(plaintext.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for TokenHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenHasher")
    }
}
