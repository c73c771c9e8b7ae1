//! Record-store contract for proposals and portal tokens.
//!
//! The relational engine is an external collaborator: this module defines the
//! narrow contract the rest of the service consumes, plus the two concrete
//! implementations: SQLite via sqlx (`SqliteRecordStore`) and an in-memory
//! mock (`InMemoryStore`) for tests.
//!
//! Store handles are constructed explicitly and injected into each component;
//! there is no module-level singleton client.
//!
//! ## Fresh reads
//!
//! `ProposalStore::fetch_fresh` is the independent read path used by
//! post-write verification. Implementations must serve it from a session
//! that cannot be the one that performed the write (SQLite: a dedicated
//! second connection pool). `fetch` may be pooled/cached; `fetch_fresh`
//! may not.

pub mod mock;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub use mock::InMemoryStore;
pub use sqlite::SqliteRecordStore;

/// Current time as seconds since the Unix epoch.
///
/// All persisted instants in this codebase are u64 unix seconds.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Errors surfaced by record-store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database/driver failure. The driver detail stays
    /// server-side; callers log it and return a generic error externally.
    #[error("database error: {0}")]
    Database(String),

    /// The targeted record does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// Store cannot be reached at all (connection refused, pool closed)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Client-facing approval status of a proposal.
///
/// Initial state is `Pending`. The approval engine transitions to one of the
/// three decision states; re-submission overwrites from whatever state is
/// currently recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "changes-requested")]
    ChangesRequested,
    #[serde(rename = "rejected")]
    Rejected,
}

impl ClientStatus {
    /// Wire/storage representation (matches the JSON literals)
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Pending => "pending",
            ClientStatus::Approved => "approved",
            ClientStatus::ChangesRequested => "changes-requested",
            ClientStatus::Rejected => "rejected",
        }
    }

    /// Parse the storage representation. Unknown values are an error so a
    /// corrupted column never silently maps to a real status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(ClientStatus::Pending),
            "approved" => Ok(ClientStatus::Approved),
            "changes-requested" => Ok(ClientStatus::ChangesRequested),
            "rejected" => Ok(ClientStatus::Rejected),
            other => Err(StoreError::Database(format!(
                "unknown client_status value: {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposal record, as far as this core is concerned.
///
/// CRUD on proposals belongs to an external collaborator; Portico reads the
/// identity/display fields at issuance and mutates only the approval subset
/// (`client_status`, `client_feedback`, `approved_at`, `approved_by`,
/// `updated_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub name: String,
    pub client_name: String,
    pub client_email: String,
    /// Display amount owned by the CRUD collaborator; no arithmetic here
    pub total_amount: Option<f64>,
    /// Internal pipeline status (draft/sent/...), owned by the collaborator
    pub status: Option<String>,
    pub client_status: ClientStatus,
    pub client_feedback: Option<String>,
    pub approved_at: Option<u64>,
    pub approved_by: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Proposal {
    /// Build a fresh pending proposal (used by seeding and tests).
    pub fn new(name: &str, client_name: &str, client_email: &str) -> Self {
        let now = now_unix();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            client_name: client_name.to_string(),
            client_email: client_email.to_string(),
            total_amount: None,
            status: None,
            client_status: ClientStatus::Pending,
            client_feedback: None,
            approved_at: None,
            approved_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The approval field set written by a decision submission.
///
/// The whole set is written in one update so a transition fully replaces the
/// prior decision's feedback/approval fields (moving away from `approved`
/// clears `approved_at`/`approved_by`).
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalUpdate {
    pub client_status: ClientStatus,
    pub client_feedback: Option<String>,
    pub approved_at: Option<u64>,
    pub approved_by: Option<String>,
    pub updated_at: u64,
}

/// Durable record of the currently active portal token for a proposal.
///
/// Keyed by `proposal_id`: saving a new record for the same proposal
/// overwrites the previous one, which is how revocation works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalTokenRecord {
    pub proposal_id: String,
    pub token: String,
    pub client_name: String,
    pub client_email: String,
    pub issued_at: u64,
    pub expires_at: u64,
    pub view_count: u64,
    pub last_viewed_at: Option<u64>,
}

/// Proposal side of the record-store contract.
#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// Insert a proposal (seeding/tests; CRUD proper is external)
    async fn insert(&self, proposal: &Proposal) -> Result<(), StoreError>;

    /// Read a proposal by id. May be served from a pooled session.
    async fn fetch(&self, id: &str) -> Result<Option<Proposal>, StoreError>;

    /// Independent read for post-write verification.
    ///
    /// Must not be served by the session that performed the write.
    async fn fetch_fresh(&self, id: &str) -> Result<Option<Proposal>, StoreError>;

    /// Write the approval field set as a single update.
    ///
    /// Returns `StoreError::NotFound` if the proposal row is gone.
    async fn update_approval(&self, id: &str, update: &ApprovalUpdate) -> Result<(), StoreError>;

    /// Number of proposal records (health/status surface)
    async fn count(&self) -> Result<u64, StoreError>;
}

/// Token side of the record-store contract.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Upsert the active token for `record.proposal_id`.
    ///
    /// Side effect: any previously saved token for that proposal becomes
    /// unresolvable via `lookup`.
    async fn save(&self, record: &PortalTokenRecord) -> Result<(), StoreError>;

    /// Resolve a presented token string to its record, if still active.
    async fn lookup(&self, token: &str) -> Result<Option<PortalTokenRecord>, StoreError>;

    /// Increment `view_count` and stamp `last_viewed_at`.
    ///
    /// Best-effort: callers must not fail a request because this failed.
    async fn record_view(&self, token: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_status_round_trip() {
        for status in [
            ClientStatus::Pending,
            ClientStatus::Approved,
            ClientStatus::ChangesRequested,
            ClientStatus::Rejected,
        ] {
            assert_eq!(ClientStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_client_status_rejects_unknown() {
        assert!(ClientStatus::parse("maybe").is_err());
        assert!(ClientStatus::parse("").is_err());
        assert!(ClientStatus::parse("Approved").is_err(), "case sensitive");
    }

    #[test]
    fn test_client_status_serde_literals() {
        // The serde literals are the wire format; keep them nailed down
        let json = serde_json::to_string(&ClientStatus::ChangesRequested).unwrap();
        assert_eq!(json, "\"changes-requested\"");
    }

    #[test]
    fn test_new_proposal_is_pending() {
        let p = Proposal::new("Website redesign", "Jane Doe", "jane@example.com");
        assert_eq!(p.client_status, ClientStatus::Pending);
        assert!(p.client_feedback.is_none());
        assert!(p.approved_at.is_none());
        assert!(p.approved_by.is_none());
        assert_eq!(p.created_at, p.updated_at);
        assert!(!p.id.is_empty());
    }

    #[test]
    fn test_now_unix_is_sane() {
        // 2024-01-01 as a floor; catches a zeroed clock
        assert!(now_unix() > 1_704_067_200);
    }
}
