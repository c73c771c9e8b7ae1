//! In-memory record store for testing.
//!
//! Provides InMemoryStore so the validator, engine, and verifier can be
//! exercised without a real database, plus failure-injection knobs for the
//! paths a live database makes hard to reproduce on demand (write failures,
//! stale verification reads, view-counter failures).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    now_unix, ApprovalUpdate, PortalTokenRecord, Proposal, ProposalStore, StoreError, TokenStore,
};

/// In-memory store implementing both sides of the record-store contract.
///
/// Clones share state, so a test can hold one handle for assertions while
/// the components under test hold others.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    proposals: HashMap<String, Proposal>,
    tokens: HashMap<String, PortalTokenRecord>,
    /// When set, `fetch_fresh` serves from this snapshot instead of live
    /// state, simulating a stale read replica for verification tests.
    frozen_fresh_view: Option<HashMap<String, Proposal>>,
    fail_writes: bool,
    fail_views: bool,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a proposal synchronously (test setup convenience)
    pub fn seed_proposal(&self, proposal: Proposal) {
        let mut state = self.state.lock().unwrap();
        state.proposals.insert(proposal.id.clone(), proposal);
    }

    /// Snapshot a proposal for assertions
    pub fn proposal(&self, id: &str) -> Option<Proposal> {
        self.state.lock().unwrap().proposals.get(id).cloned()
    }

    /// Snapshot a token record for assertions
    pub fn token(&self, token: &str) -> Option<PortalTokenRecord> {
        self.state.lock().unwrap().tokens.get(token).cloned()
    }

    /// Freeze the fresh-read view at the current state.
    ///
    /// Subsequent writes are visible to `fetch` but not `fetch_fresh`,
    /// simulating a write acknowledged by one session while an independent
    /// read still observes old data.
    pub fn freeze_fresh_view(&self) {
        let mut state = self.state.lock().unwrap();
        state.frozen_fresh_view = Some(state.proposals.clone());
    }

    /// Thaw the fresh-read view back to live state
    pub fn thaw_fresh_view(&self) {
        self.state.lock().unwrap().frozen_fresh_view = None;
    }

    /// Make every write fail with a database error
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// Make `record_view` fail with a database error
    pub fn fail_views(&self, fail: bool) {
        self.state.lock().unwrap().fail_views = fail;
    }

    /// Clear all state and knobs
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        *state = MockState::default();
    }
}

#[async_trait]
impl ProposalStore for InMemoryStore {
    async fn insert(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(StoreError::Database("injected write failure".to_string()));
        }
        state
            .proposals
            .insert(proposal.id.clone(), proposal.clone());
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Proposal>, StoreError> {
        Ok(self.state.lock().unwrap().proposals.get(id).cloned())
    }

    async fn fetch_fresh(&self, id: &str) -> Result<Option<Proposal>, StoreError> {
        let state = self.state.lock().unwrap();
        match &state.frozen_fresh_view {
            Some(frozen) => Ok(frozen.get(id).cloned()),
            None => Ok(state.proposals.get(id).cloned()),
        }
    }

    async fn update_approval(&self, id: &str, update: &ApprovalUpdate) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(StoreError::Database("injected write failure".to_string()));
        }
        let proposal = state
            .proposals
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("proposal {}", id)))?;
        proposal.client_status = update.client_status;
        proposal.client_feedback = update.client_feedback.clone();
        proposal.approved_at = update.approved_at;
        proposal.approved_by = update.approved_by.clone();
        proposal.updated_at = update.updated_at;
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().unwrap().proposals.len() as u64)
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn save(&self, record: &PortalTokenRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(StoreError::Database("injected write failure".to_string()));
        }
        // One active token per proposal: drop any token row currently
        // pointing at this proposal before inserting the replacement.
        state
            .tokens
            .retain(|_, existing| existing.proposal_id != record.proposal_id);
        state.tokens.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn lookup(&self, token: &str) -> Result<Option<PortalTokenRecord>, StoreError> {
        Ok(self.state.lock().unwrap().tokens.get(token).cloned())
    }

    async fn record_view(&self, token: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_views {
            return Err(StoreError::Database("injected view failure".to_string()));
        }
        let record = state
            .tokens
            .get_mut(token)
            .ok_or_else(|| StoreError::NotFound("token".to_string()))?;
        record.view_count += 1;
        record.last_viewed_at = Some(now_unix());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ClientStatus;

    fn sample_token(proposal_id: &str, token: &str) -> PortalTokenRecord {
        let now = now_unix();
        PortalTokenRecord {
            proposal_id: proposal_id.to_string(),
            token: token.to_string(),
            client_name: "Jane Doe".to_string(),
            client_email: "jane@example.com".to_string(),
            issued_at: now,
            expires_at: now + 3600,
            view_count: 0,
            last_viewed_at: None,
        }
    }

    #[tokio::test]
    async fn test_token_overwrite_revokes_previous() {
        let store = InMemoryStore::new();

        store.save(&sample_token("p1", "first")).await.unwrap();
        store.save(&sample_token("p1", "second")).await.unwrap();

        assert!(store.lookup("first").await.unwrap().is_none());
        assert!(store.lookup("second").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_frozen_fresh_view_serves_stale_data() {
        let store = InMemoryStore::new();
        let proposal = Proposal::new("Deal", "Jane Doe", "jane@example.com");
        let id = proposal.id.clone();
        store.seed_proposal(proposal);

        store.freeze_fresh_view();

        let update = ApprovalUpdate {
            client_status: ClientStatus::Approved,
            client_feedback: None,
            approved_at: Some(now_unix()),
            approved_by: Some("Jane Doe".to_string()),
            updated_at: now_unix(),
        };
        store.update_approval(&id, &update).await.unwrap();

        // Live read sees the write, frozen fresh read does not
        let live = store.fetch(&id).await.unwrap().unwrap();
        assert_eq!(live.client_status, ClientStatus::Approved);
        let fresh = store.fetch_fresh(&id).await.unwrap().unwrap();
        assert_eq!(fresh.client_status, ClientStatus::Pending);

        store.thaw_fresh_view();
        let fresh = store.fetch_fresh(&id).await.unwrap().unwrap();
        assert_eq!(fresh.client_status, ClientStatus::Approved);
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = InMemoryStore::new();
        store.fail_writes(true);

        let err = store
            .insert(&Proposal::new("Deal", "Jane Doe", "jane@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn test_record_view_tracks_count_and_time() {
        let store = InMemoryStore::new();
        store.save(&sample_token("p1", "tok")).await.unwrap();

        store.record_view("tok").await.unwrap();
        store.record_view("tok").await.unwrap();

        let record = store.token("tok").unwrap();
        assert_eq!(record.view_count, 2);
        assert!(record.last_viewed_at.is_some());
    }
}
