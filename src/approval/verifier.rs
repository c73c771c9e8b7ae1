//! Post-write persistence verification
//!
//! The decision write traverses a store that may be backed by pooled or
//! multiplexed connections, where a write and a subsequent read are not
//! guaranteed to be served by the same session. This step exists to catch
//! silent write failures (a write that returned success while an
//! independent read still observes old data) before success is ever
//! reported to the external caller.
//!
//! The verifier re-reads the record over the store's fresh read path
//! (`ProposalStore::fetch_fresh`) and compares the observed client status
//! against the intended one. On any failure the engine reports a server
//! error; correctness of what the client believes happened takes precedence
//! over a smooth user experience.

use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use crate::store::{ClientStatus, ProposalStore, StoreError};

/// Verification failures.
///
/// `Mismatch` and `RecordMissing` both mean "we do not know that the write
/// took effect", distinct from a plain store error so operators can tell
/// the conditions apart.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The re-read observed a different status than the write intended
    #[error("verification mismatch: expected {expected}, found {actual}")]
    Mismatch {
        expected: ClientStatus,
        actual: ClientStatus,
    },

    /// The record disappeared between write and re-read
    #[error("verification failed: proposal {0} missing on re-read")]
    RecordMissing(String),

    /// The verification read itself failed
    #[error("verification read failed: {0}")]
    Store(#[from] StoreError),

    /// The verification read did not complete in time; treated exactly
    /// like a mismatch: never assume the write succeeded
    #[error("verification timed out")]
    Timeout,
}

/// Independently re-reads a proposal after a decision write.
#[derive(Clone)]
pub struct PersistenceVerifier {
    proposals: Arc<dyn ProposalStore>,
}

impl PersistenceVerifier {
    pub fn new(proposals: Arc<dyn ProposalStore>) -> Self {
        Self { proposals }
    }

    /// Confirm that `proposal_id` now carries `expected` as its client
    /// status. Reads through `fetch_fresh` only.
    pub async fn verify(
        &self,
        proposal_id: &str,
        expected: ClientStatus,
    ) -> Result<(), VerifyError> {
        let proposal = self
            .proposals
            .fetch_fresh(proposal_id)
            .await?
            .ok_or_else(|| VerifyError::RecordMissing(proposal_id.to_string()))?;

        if proposal.client_status != expected {
            error!(
                proposal_id = %proposal_id,
                expected = %expected,
                actual = %proposal.client_status,
                "persistence verification mismatch"
            );
            return Err(VerifyError::Mismatch {
                expected,
                actual: proposal.client_status,
            });
        }

        Ok(())
    }
}
