//! Approval workflow engine (write path B)
//!
//! Consumes a validated portal token and records the client's decision
//! against the proposal, with verification before success is reported.
//!
//! Steps:
//! 1. Parse the decision value (reject anything outside the three literals)
//! 2. Validate the token; on failure the record is never touched
//! 3. Confirm the target proposal exists
//! 4. Compute the new approval field set
//! 5. Write it through the record store as a single update
//! 6. Verify the persisted state via an independent re-read
//!
//! Steps 4–6 run under the per-proposal advisory lock, inside a detached
//! task: a caller disconnect cannot cancel the write or its verification,
//! and the submission is answered only after verification settles. Every
//! store call is bounded by the request-level timeout; a timeout during
//! verification is reported as verification failure, never success.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::warn;

use crate::store::{now_unix, ApprovalUpdate, ProposalStore, StoreError};
use crate::token::{TokenValidator, ValidationError};

use super::decision::ClientDecision;
use super::locks::ProposalLocks;
use super::verifier::{PersistenceVerifier, VerifyError};

/// Default bound on each store call inside a submission
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from a decision submission, ordered by the step that raises them.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// The decision value is not one of the three literals
    #[error("invalid decision value: {0:?}")]
    InvalidDecision(String),

    /// Token failed validation; one generic message for every sub-cause
    #[error("invalid or expired portal token")]
    Unauthorized,

    /// The proposal the token points at does not exist
    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    /// The store write (or a pre-write read) failed; nothing was verified
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The write was issued but verification did not confirm it.
    /// Operators must treat this as "unknown outcome", not "failed write".
    #[error(transparent)]
    Verification(#[from] VerifyError),
}

impl From<StoreError> for ApprovalError {
    fn from(e: StoreError) -> Self {
        ApprovalError::Persistence(e.to_string())
    }
}

impl From<ValidationError> for ApprovalError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::Invalid => ApprovalError::Unauthorized,
            ValidationError::Store(e) => ApprovalError::Persistence(e.to_string()),
        }
    }
}

/// A verified, recorded decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub proposal_id: String,
    pub decision: ClientDecision,
    /// Fixed confirmation template for this decision
    pub message: &'static str,
    /// Fixed next-steps template for this decision
    pub next_steps: &'static str,
    pub client_feedback: Option<String>,
    /// When the transition was recorded, unix seconds
    pub timestamp: u64,
}

/// Records client decisions against proposals.
///
/// Cheap to clone; clones share stores, locks, and validator.
#[derive(Clone)]
pub struct ApprovalEngine {
    proposals: Arc<dyn ProposalStore>,
    validator: TokenValidator,
    verifier: PersistenceVerifier,
    locks: ProposalLocks,
    io_timeout: Duration,
}

impl ApprovalEngine {
    pub fn new(
        proposals: Arc<dyn ProposalStore>,
        validator: TokenValidator,
        io_timeout: Duration,
    ) -> Self {
        let verifier = PersistenceVerifier::new(proposals.clone());
        Self {
            proposals,
            validator,
            verifier,
            locks: ProposalLocks::new(),
            io_timeout,
        }
    }

    /// Submit a client decision presented with a portal token.
    ///
    /// # Arguments
    ///
    /// * `token` - The bearer token from the portal URL
    /// * `decision_raw` - Wire literal; must be one of
    ///   `approved` / `changes-requested` / `rejected`
    /// * `comment` - Optional free-text feedback; blank is treated as absent
    /// * `submitted_client_name` - Optional name typed at submission; falls
    ///   back to the name the token was issued for
    pub async fn submit_decision(
        &self,
        token: &str,
        decision_raw: &str,
        comment: Option<String>,
        submitted_client_name: Option<String>,
    ) -> Result<DecisionOutcome, ApprovalError> {
        // 1. Input check before anything else touches state
        let decision = ClientDecision::parse(decision_raw)
            .ok_or_else(|| ApprovalError::InvalidDecision(decision_raw.to_string()))?;

        // 2. Token gate
        let access = self.validator.validate(token).await?;

        // 3. Existence check
        let exists = timeout(self.io_timeout, self.proposals.fetch(&access.proposal_id))
            .await
            .map_err(|_| ApprovalError::Persistence("proposal read timed out".to_string()))??
            .is_some();
        if !exists {
            return Err(ApprovalError::ProposalNotFound(access.proposal_id));
        }

        // 4-6. Write and verify in a detached task so the submission
        // survives a caller disconnect, serialized per proposal.
        let proposals = self.proposals.clone();
        let verifier = self.verifier.clone();
        let locks = self.locks.clone();
        let io_timeout = self.io_timeout;
        let proposal_id = access.proposal_id.clone();
        let approved_by = submitted_client_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(access.client_name);
        let feedback = comment.filter(|c| !c.trim().is_empty());

        let handle = tokio::spawn(async move {
            let _guard = locks.acquire(&proposal_id).await;
            let now = now_unix();

            let update = ApprovalUpdate {
                client_status: decision.as_status(),
                client_feedback: feedback.clone(),
                approved_at: (decision == ClientDecision::Approved).then_some(now),
                approved_by: (decision == ClientDecision::Approved).then(|| approved_by.clone()),
                updated_at: now,
            };

            // 5. Single atomic update of the whole field set
            match timeout(io_timeout, proposals.update_approval(&proposal_id, &update)).await {
                Ok(Ok(())) => {}
                Ok(Err(StoreError::NotFound(_))) => {
                    return Err(ApprovalError::ProposalNotFound(proposal_id));
                }
                Ok(Err(e)) => return Err(ApprovalError::Persistence(e.to_string())),
                Err(_) => {
                    return Err(ApprovalError::Persistence(
                        "decision write timed out".to_string(),
                    ));
                }
            }

            // 6. Verify before reporting anything
            match timeout(io_timeout, verifier.verify(&proposal_id, decision.as_status())).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(ApprovalError::Verification(e)),
                Err(_) => return Err(ApprovalError::Verification(VerifyError::Timeout)),
            }

            Ok(DecisionOutcome {
                proposal_id,
                decision,
                message: decision.message(),
                next_steps: decision.next_steps(),
                client_feedback: feedback,
                timestamp: now,
            })
        });

        handle.await.unwrap_or_else(|e| {
            warn!(error = %e, "decision task did not complete");
            Err(ApprovalError::Persistence(
                "decision task did not complete".to_string(),
            ))
        })
    }
}
