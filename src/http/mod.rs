//! HTTP boundary: the portal issuance and approval endpoints.
//!
//! Three routes:
//! - `POST /proposals/:proposal_id/portal` - internal issuance
//! - `GET  /portal/:token`                - external portal view
//! - `POST /portal/:token/approve`        - external decision submission
//!
//! Non-POST methods on the POST routes get axum's method-router 405 with an
//! `Allow` header. All failure bodies are JSON with a stable `error` key.

pub mod portal;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;

use crate::approval::ApprovalEngine;
use crate::crypto::PortalKeyring;
use crate::gatekeeper::AttemptLimiter;
use crate::store::{ProposalStore, TokenStore};
use crate::token::{PortalIssuer, TokenCodec, TokenValidator};

/// Shared handler state.
///
/// Every component is constructed here and injected; there are no
/// module-level singletons. Clones share the underlying handles.
#[derive(Clone)]
pub struct AppState {
    pub issuer: PortalIssuer,
    pub engine: ApprovalEngine,
    pub validator: TokenValidator,
    pub limiter: AttemptLimiter,
    pub proposals: Arc<dyn ProposalStore>,
}

impl AppState {
    /// Assemble the service from its store handles and keyring.
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        tokens: Arc<dyn TokenStore>,
        keyring: &PortalKeyring,
        base_url: &str,
        io_timeout: Duration,
    ) -> Self {
        let codec = Arc::new(TokenCodec::new(keyring.token_signing_key()));
        let issuer = PortalIssuer::new(codec.clone(), tokens.clone(), proposals.clone(), base_url);
        let validator = TokenValidator::new(codec, tokens);
        let engine = ApprovalEngine::new(proposals.clone(), validator.clone(), io_timeout);

        Self {
            issuer,
            engine,
            validator,
            limiter: AttemptLimiter::new(),
            proposals,
        }
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/proposals/:proposal_id/portal", post(portal::issue_portal))
        .route("/portal/:token", get(portal::view_portal))
        .route("/portal/:token/approve", post(portal::submit_decision))
        .with_state(state)
}
