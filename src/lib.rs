//! Portico - Client Portal Service for Proposal Approvals
//!
//! Grants time-limited, unauthenticated access to a single proposal via a
//! signed bearer token embedded in a portal URL, and records the client's
//! approval decision against that proposal.
//!
//! Key principles:
//! - One active token per proposal (reissuance revokes by overwrite)
//! - Every token failure looks identical to the external caller
//! - A decision is never reported as recorded until an independent
//!   re-read has verified the persisted state

pub mod approval;
pub mod crypto;
pub mod gatekeeper;
pub mod http;
pub mod store;
pub mod token;
