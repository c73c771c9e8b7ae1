//! Approval workflow: decision values, per-proposal serialization, the
//! submission engine, and post-write persistence verification.

pub mod decision;
pub mod engine;
pub mod locks;
pub mod verifier;

pub use decision::ClientDecision;
pub use engine::{ApprovalEngine, ApprovalError, DecisionOutcome, DEFAULT_IO_TIMEOUT};
pub use locks::ProposalLocks;
pub use verifier::{PersistenceVerifier, VerifyError};
