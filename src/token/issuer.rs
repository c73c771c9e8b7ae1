//! Portal token issuance (write path A)
//!
//! An internal caller asks for a portal link for a proposal. Issuance loads
//! the proposal, builds claims from its client identity, signs the token,
//! and upserts the active-token record, superseding any previously issued
//! token for that proposal.
//!
//! A store failure here is an explicit `Unavailable` error. The service
//! never synthesizes a plausible-looking success for a proposal it could
//! not actually load or persist a token for.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::store::{now_unix, PortalTokenRecord, Proposal, ProposalStore, StoreError, TokenStore};

use super::codec::{CodecError, TokenCodec};
use super::ttl::TokenTtl;

/// Errors from the issuance path
#[derive(Debug, Error)]
pub enum IssueError {
    /// The proposal the caller wants a portal for does not exist
    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    /// The record store failed; no token was issued
    #[error("store unavailable: {0}")]
    Unavailable(#[from] StoreError),

    /// Token encoding failed (should not happen for valid claims)
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A successfully issued portal, ready for the issuance response
#[derive(Debug, Clone)]
pub struct IssuedPortal {
    pub token: String,
    pub expires_at: u64,
    pub portal_url: String,
    pub proposal: Proposal,
}

/// Issues portal tokens for proposals.
///
/// Cheap to clone; all fields are shared handles.
#[derive(Clone)]
pub struct PortalIssuer {
    codec: Arc<TokenCodec>,
    tokens: Arc<dyn TokenStore>,
    proposals: Arc<dyn ProposalStore>,
    /// Public base URL the portal link is built on (no trailing slash)
    base_url: String,
}

impl PortalIssuer {
    pub fn new(
        codec: Arc<TokenCodec>,
        tokens: Arc<dyn TokenStore>,
        proposals: Arc<dyn ProposalStore>,
        base_url: &str,
    ) -> Self {
        Self {
            codec,
            tokens,
            proposals,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Issue a portal token for `proposal_id`.
    ///
    /// `expiry_hint` is the caller's optional `customExpiry` value; anything
    /// unrecognized falls back to the 30-day default (see `TokenTtl`).
    ///
    /// Saving the new record overwrites the proposal's previous active
    /// token, which stops validating immediately ("last issued token wins").
    pub async fn issue(
        &self,
        proposal_id: &str,
        expiry_hint: Option<&str>,
    ) -> Result<IssuedPortal, IssueError> {
        let proposal = self
            .proposals
            .fetch(proposal_id)
            .await?
            .ok_or_else(|| IssueError::ProposalNotFound(proposal_id.to_string()))?;

        let ttl = TokenTtl::from_hint(expiry_hint);
        let now = now_unix();
        let (issued, claims) = self.codec.issue(
            &proposal.id,
            &proposal.client_name,
            &proposal.client_email,
            ttl,
            now,
        )?;

        let record = PortalTokenRecord {
            proposal_id: proposal.id.clone(),
            token: issued.token.clone(),
            client_name: claims.name,
            client_email: claims.email,
            issued_at: claims.iat,
            expires_at: claims.exp,
            view_count: 0,
            last_viewed_at: None,
        };
        self.tokens.save(&record).await?;

        info!(
            proposal_id = %proposal.id,
            ttl = ttl.as_str(),
            expires_at = issued.expires_at,
            "issued portal token"
        );

        Ok(IssuedPortal {
            portal_url: format!("{}/portal/{}", self.base_url, issued.token),
            token: issued.token,
            expires_at: issued.expires_at,
            proposal,
        })
    }
}
