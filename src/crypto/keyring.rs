//! Key derivation from the operator master secret
//!
//! This module centralizes cryptographic key derivation in Portico.
//! All keys are derived from the operator-provisioned master secret using
//! HKDF-SHA256 with domain separation.
//!
//! ## Key Hierarchy
//!
//! ```text
//! Master secret (hex, >= 32 bytes)
//!         │
//!         ▼
//! HKDF-SHA256(salt="portico-master-v1", secret)
//!         │
//!         └─► HKDF expand("portal-token-signing") → token_signing_key
//! ```
//!
//! ## Security Properties
//!
//! - **Single Root**: the master secret is the single root of trust; the
//!   derived signing key never appears in config files or logs.
//! - **Domain Separation**: each key purpose uses a unique HKDF info string.
//! - **Versioning**: the master salt carries a "v1" suffix for future rotation.
//! - **Zeroization**: derived key material is cleared on drop.

use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroize;

/// Domain separation salt for master key derivation (versioned for rotation)
const MASTER_SALT: &[u8] = b"portico-master-v1";

/// Minimum master secret length in bytes (decoded)
const MIN_SECRET_BYTES: usize = 32;

/// HKDF info strings for purpose-specific key derivation
mod purposes {
    pub const TOKEN_SIGNING: &[u8] = b"portal-token-signing";
}

/// Errors that can occur during key derivation
#[derive(Debug, Error)]
pub enum KeyringError {
    /// Master secret is not valid hex or is too short
    #[error("Invalid master secret: {0}")]
    InvalidSecret(String),

    /// HKDF expansion failed (should never happen with valid lengths)
    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),
}

/// Keyring holding the keys derived from the operator master secret.
///
/// # Security
///
/// - Key material is zeroized on drop
/// - Keys are derived at construction time and never re-derived
/// - The master secret itself is NOT stored (only derived keys)
pub struct PortalKeyring {
    /// Key epoch (derivation generation), default 1.
    /// Incremented on rotation, enables migration tracking.
    epoch: u64,

    /// Key for HMAC-SHA256 portal token signing
    token_signing_key: [u8; 32],
}

impl Drop for PortalKeyring {
    fn drop(&mut self) {
        self.token_signing_key.zeroize();
    }
}

impl PortalKeyring {
    /// Create a keyring from a hex-encoded master secret.
    ///
    /// The secret must decode to at least 32 bytes. Generate one with e.g.
    /// `openssl rand -hex 32` and provision it via `PORTICO_MASTER_SECRET`
    /// or a secret file.
    ///
    /// # Arguments
    ///
    /// * `secret_hex` - Hex-encoded master secret (whitespace is trimmed)
    ///
    /// # Security
    ///
    /// The caller should zeroize the secret string after this call.
    pub fn from_master_secret(secret_hex: &str) -> Result<Self, KeyringError> {
        let mut secret = hex::decode(secret_hex.trim())
            .map_err(|e| KeyringError::InvalidSecret(format!("not valid hex: {}", e)))?;

        if secret.len() < MIN_SECRET_BYTES {
            let got = secret.len();
            secret.zeroize();
            return Err(KeyringError::InvalidSecret(format!(
                "secret must be at least {} bytes, got {}",
                MIN_SECRET_BYTES, got
            )));
        }

        let hkdf = Hkdf::<Sha256>::new(Some(MASTER_SALT), &secret);
        let token_signing_key = Self::derive_key(&hkdf, purposes::TOKEN_SIGNING)?;
        secret.zeroize();

        Ok(Self {
            epoch: 1,
            token_signing_key,
        })
    }

    /// Derive a 32-byte key using HKDF expand with the given info string.
    fn derive_key(hkdf: &Hkdf<Sha256>, info: &[u8]) -> Result<[u8; 32], KeyringError> {
        let mut key = [0u8; 32];
        hkdf.expand(info, &mut key)
            .map_err(|e| KeyringError::DerivationFailed(format!("{:?}", e)))?;
        Ok(key)
    }

    /// Get the key epoch (derivation generation).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Get the portal token signing key for HMAC-SHA256.
    ///
    /// Use this to construct `token::TokenCodec`.
    pub fn token_signing_key(&self) -> &[u8; 32] {
        &self.token_signing_key
    }
}
