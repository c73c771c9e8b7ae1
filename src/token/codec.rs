//! Portal token codec
//!
//! Encodes and decodes the signed bearer token embedded in portal URLs.
//!
//! ## Wire Format
//!
//! ```text
//! pp1.<hex(payload)>.<hex(mac)>
//!
//! payload = JSON { pid, name, email, iat, exp, nonce }
//! mac     = HMAC-SHA256(token_signing_key, payload)
//! ```
//!
//! The MAC makes tokens unforgeable and non-enumerable without the signing
//! key; the 16-byte random nonce makes two tokens for the same proposal
//! distinct. `decode` is a pure function: it verifies structure and
//! signature only. Expiry and revocation are the validator's job, against
//! the clock and the token store.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::hmac;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ttl::TokenTtl;

/// Token format prefix, versioned so the format can evolve
const TOKEN_PREFIX: &str = "pp1";

/// Errors from token decoding
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input does not have the expected structure
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Structure is fine but the MAC does not verify
    #[error("token signature verification failed")]
    BadSignature,
}

/// Claims carried inside a portal token.
///
/// Field names are deliberately short; the payload rides in a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalClaims {
    /// Proposal identifier
    pub pid: String,
    /// Client display name captured at issuance
    pub name: String,
    /// Client email captured at issuance
    pub email: String,
    /// Issued-at, unix seconds
    pub iat: u64,
    /// Expires-at, unix seconds; always > iat
    pub exp: u64,
    /// Random 16-byte hex nonce; distinguishes reissued tokens
    pub nonce: String,
}

/// A freshly issued token with its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

/// Signs and verifies portal tokens with a keyring-derived HMAC key.
pub struct TokenCodec {
    key: hmac::Key,
}

impl TokenCodec {
    /// Build a codec over the given signing key (see `crypto::PortalKeyring`).
    pub fn new(signing_key: &[u8; 32]) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, signing_key),
        }
    }

    /// Issue a signed token for a proposal.
    ///
    /// # Arguments
    ///
    /// * `proposal_id` - Identifier of the proposal the token grants access to
    /// * `client_name` / `client_email` - Display identity, immutable after issuance
    /// * `ttl` - Lifetime window (see `TokenTtl::from_hint`)
    /// * `now` - Current time, unix seconds (injected so issuance is testable)
    pub fn issue(
        &self,
        proposal_id: &str,
        client_name: &str,
        client_email: &str,
        ttl: TokenTtl,
        now: u64,
    ) -> Result<(IssuedToken, PortalClaims), CodecError> {
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);

        let claims = PortalClaims {
            pid: proposal_id.to_string(),
            name: client_name.to_string(),
            email: client_email.to_string(),
            iat: now,
            exp: now + ttl.as_secs(),
            nonce: hex::encode(nonce),
        };

        let token = self.encode(&claims)?;
        Ok((
            IssuedToken {
                token,
                expires_at: claims.exp,
            },
            claims,
        ))
    }

    /// Encode claims into the signed wire form.
    pub fn encode(&self, claims: &PortalClaims) -> Result<String, CodecError> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| CodecError::Malformed(format!("payload serialization: {}", e)))?;
        let mac = hmac::sign(&self.key, &payload);
        Ok(format!(
            "{}.{}.{}",
            TOKEN_PREFIX,
            hex::encode(&payload),
            hex::encode(mac.as_ref())
        ))
    }

    /// Decode and verify a presented token.
    ///
    /// Pure function, no I/O and no clock: a well-signed but expired token
    /// decodes successfully here and is rejected by the validator.
    pub fn decode(&self, token: &str) -> Result<PortalClaims, CodecError> {
        let mut parts = token.split('.');
        let (prefix, payload_hex, mac_hex) = match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some(p), Some(payload), Some(mac), None) => (p, payload, mac),
            _ => return Err(CodecError::Malformed("expected 3 dot-separated parts".to_string())),
        };

        if prefix != TOKEN_PREFIX {
            return Err(CodecError::Malformed(format!(
                "unknown token prefix: {:?}",
                prefix
            )));
        }

        let payload = hex::decode(payload_hex)
            .map_err(|_| CodecError::Malformed("payload is not valid hex".to_string()))?;
        let mac = hex::decode(mac_hex)
            .map_err(|_| CodecError::Malformed("signature is not valid hex".to_string()))?;

        // Constant-time comparison via ring
        hmac::verify(&self.key, &payload, &mac).map_err(|_| CodecError::BadSignature)?;

        let claims: PortalClaims = serde_json::from_slice(&payload)
            .map_err(|e| CodecError::Malformed(format!("payload JSON: {}", e)))?;

        if claims.exp <= claims.iat {
            return Err(CodecError::Malformed(
                "expiry is not after issuance".to_string(),
            ));
        }

        Ok(claims)
    }
}
