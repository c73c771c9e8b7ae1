//! Per-proposal advisory locks
//!
//! Two concurrent decision submissions for the same proposal must not
//! interleave their read-modify-write-verify sequences: the last
//! unserialized writer could pass verification against its own write while
//! clobbering the other's. The registry hands out one async mutex per
//! proposal id; the guard is owned, so it can cross the spawned critical
//! section, and it is released on every exit path including verifier
//! failure.
//!
//! Submissions for different proposals never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-proposal advisory locks.
///
/// Clones share the registry.
#[derive(Clone, Default)]
pub struct ProposalLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ProposalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `proposal_id`, waiting if another submission
    /// holds it. The returned guard unlocks on drop.
    pub async fn acquire(&self, proposal_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            // Drop registry entries nobody is waiting on; the map stays
            // bounded by the number of concurrently locked proposals.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry(proposal_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of registered locks (test surface)
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}
