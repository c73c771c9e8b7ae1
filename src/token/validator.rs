//! Portal token validation
//!
//! Decides whether a presented token still grants access. Three checks, all
//! required: the signature must verify (codec), the token must still be the
//! proposal's active token (store lookup), and it must not be expired
//! (clock). Externally every failure collapses to one generic "invalid or
//! expired" error so callers cannot distinguish a forged token from a
//! superseded or expired one; the sub-cause is logged server-side only.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::store::{now_unix, StoreError, TokenStore};

use super::codec::TokenCodec;

/// Validation outcome: what the token grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAccess {
    pub proposal_id: String,
    pub client_name: String,
    pub client_email: String,
    pub expires_at: u64,
}

/// Validation failures.
///
/// `Invalid` is deliberately cause-free: malformed, unknown, superseded, and
/// expired all look identical to the external caller. `Store` is different:
/// it means validation could not run at all and maps to a server error, not
/// a 401.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid or expired portal token")]
    Invalid,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates presented portal tokens against the codec, store, and clock.
#[derive(Clone)]
pub struct TokenValidator {
    codec: Arc<TokenCodec>,
    tokens: Arc<dyn TokenStore>,
}

impl TokenValidator {
    pub fn new(codec: Arc<TokenCodec>, tokens: Arc<dyn TokenStore>) -> Self {
        Self { codec, tokens }
    }

    /// Validate a presented token.
    pub async fn validate(&self, token: &str) -> Result<ValidatedAccess, ValidationError> {
        // 1. Signature + structure
        let claims = match self.codec.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(reason = %e, "portal token validation failed: decode");
                return Err(ValidationError::Invalid);
            }
        };

        // 2. Still the active token for its proposal? A well-signed token
        //    that has been superseded by reissuance is absent here.
        let record = match self.tokens.lookup(token).await? {
            Some(record) => record,
            None => {
                warn!(proposal_id = %claims.pid, "portal token validation failed: not active");
                return Err(ValidationError::Invalid);
            }
        };

        // 3. Expiry, against the stored instant
        let now = now_unix();
        if now >= record.expires_at {
            warn!(
                proposal_id = %record.proposal_id,
                expired_at = record.expires_at,
                "portal token validation failed: expired"
            );
            return Err(ValidationError::Invalid);
        }

        Ok(ValidatedAccess {
            proposal_id: record.proposal_id,
            client_name: record.client_name,
            client_email: record.client_email,
            expires_at: record.expires_at,
        })
    }

    /// Record that a successful validation represented a view.
    ///
    /// Best-effort: a store failure here is logged and swallowed, never
    /// surfaced to the caller.
    pub async fn note_view(&self, token: &str) {
        if let Err(e) = self.tokens.record_view(token).await {
            warn!(error = %e, "failed to record portal view");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, PortalTokenRecord};

    const TEST_KEY: [u8; 32] = [9u8; 32];

    fn setup() -> (InMemoryStore, Arc<TokenCodec>, TokenValidator) {
        let store = InMemoryStore::new();
        let codec = Arc::new(TokenCodec::new(&TEST_KEY));
        let validator = TokenValidator::new(codec.clone(), Arc::new(store.clone()));
        (store, codec, validator)
    }

    async fn issue_into_store(
        store: &InMemoryStore,
        codec: &TokenCodec,
        proposal_id: &str,
        issued_at: u64,
        expires_at: u64,
    ) -> String {
        let claims = crate::token::codec::PortalClaims {
            pid: proposal_id.to_string(),
            name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            iat: issued_at,
            exp: expires_at,
            nonce: "ab".repeat(16),
        };
        let token = codec.encode(&claims).unwrap();
        crate::store::TokenStore::save(
            store,
            &PortalTokenRecord {
                proposal_id: proposal_id.to_string(),
                token: token.clone(),
                client_name: claims.name,
                client_email: claims.email,
                issued_at,
                expires_at,
                view_count: 0,
                last_viewed_at: None,
            },
        )
        .await
        .unwrap();
        token
    }

    #[tokio::test]
    async fn test_validate_active_token() {
        let (store, codec, validator) = setup();
        let now = now_unix();
        let token = issue_into_store(&store, &codec, "p1", now, now + 3600).await;

        let access = validator.validate(&token).await.unwrap();
        assert_eq!(access.proposal_id, "p1");
        assert_eq!(access.client_name, "Jane Doe");
        assert_eq!(access.client_email, "jane@example.com");
        assert_eq!(access.expires_at, now + 3600);
    }

    #[tokio::test]
    async fn test_validate_rejects_garbage() {
        let (_store, _codec, validator) = setup();
        let err = validator.validate("pp1.junk").await.unwrap_err();
        assert!(matches!(err, ValidationError::Invalid));
    }

    #[tokio::test]
    async fn test_validate_rejects_expired() {
        let (store, codec, validator) = setup();
        let now = now_unix();
        // Well-signed, present in the store, but past expiry
        let token = issue_into_store(&store, &codec, "p1", now - 7200, now - 1).await;

        let err = validator.validate(&token).await.unwrap_err();
        assert!(matches!(err, ValidationError::Invalid));
    }

    #[tokio::test]
    async fn test_validate_rejects_superseded_token() {
        let (store, codec, validator) = setup();
        let now = now_unix();

        let first = issue_into_store(&store, &codec, "p1", now, now + 3600).await;
        let second = issue_into_store(&store, &codec, "p1", now + 1, now + 3600).await;

        // The first token is still well-signed and unexpired, but no longer
        // the active token -> invalid, indistinguishable from malformed
        let err = validator.validate(&first).await.unwrap_err();
        assert!(matches!(err, ValidationError::Invalid));
        assert!(validator.validate(&second).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_rejects_well_signed_unknown_token() {
        let (_store, codec, validator) = setup();
        // Signed with the right key but never saved
        let claims = crate::token::codec::PortalClaims {
            pid: "p1".to_string(),
            name: "Jane".to_string(),
            email: "j@example.com".to_string(),
            iat: now_unix(),
            exp: now_unix() + 3600,
            nonce: "cd".repeat(16),
        };
        let token = codec.encode(&claims).unwrap();

        let err = validator.validate(&token).await.unwrap_err();
        assert!(matches!(err, ValidationError::Invalid));
    }

    #[tokio::test]
    async fn test_note_view_swallows_store_failure() {
        let (store, codec, validator) = setup();
        let now = now_unix();
        let token = issue_into_store(&store, &codec, "p1", now, now + 3600).await;

        store.fail_views(true);
        // Must not panic or propagate
        validator.note_view(&token).await;

        store.fail_views(false);
        validator.note_view(&token).await;
        assert_eq!(store.token(&token).unwrap().view_count, 1);
    }

    #[tokio::test]
    async fn test_validation_boundary_around_expiry() {
        let (store, codec, validator) = setup();
        let now = now_unix();

        // Shortly before expiry: valid
        let token = issue_into_store(&store, &codec, "p1", now - 100, now + 30).await;
        assert!(validator.validate(&token).await.is_ok());

        // At/after the expiry instant: invalid
        let token = issue_into_store(&store, &codec, "p2", now - 100, now).await;
        assert!(matches!(
            validator.validate(&token).await.unwrap_err(),
            ValidationError::Invalid
        ));
    }
}
