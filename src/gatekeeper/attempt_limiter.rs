//! Progressive cooldown for invalid portal token attempts
//!
//! The approval endpoint is unauthenticated by design, so repeated invalid
//! token presentations from one client are the cheapest probe an attacker
//! has. Each consecutive failure from the same client address earns a
//! longer cooldown before the next attempt is accepted; a successful
//! validation clears the slate.
//!
//! ## Cooldown Tiers
//!
//! - 1st failure: immediate retry (0 seconds)
//! - 2nd failure: 2 seconds
//! - 3rd failure: 10 seconds
//! - 4th failure: 1 minute (60 seconds)
//! - 5th+ failure: 5 minutes (300 seconds)
//!
//! ## Implementation Notes
//!
//! - Per-client tracking keyed by peer address string
//! - Failure counts reset once a cooldown fully expires or on success
//! - Thread-safe for concurrent access

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

/// Cooldown duration for each failure tier.
const COOLDOWN_TIERS: &[u64] = &[
    0,   // 1st failure: immediate retry
    2,   // 2nd failure: 2 seconds
    10,  // 3rd failure: 10 seconds
    60,  // 4th failure: 1 minute
    300, // 5th+ failure: 5 minutes
];

/// Limiter state for a single client address.
#[derive(Debug, Clone)]
struct AttemptState {
    /// Number of consecutive invalid attempts
    failure_count: u32,
    /// Timestamp of the last invalid attempt
    last_failure: SystemTime,
}

/// Progressive cooldown limiter for invalid token attempts.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct AttemptLimiter {
    /// State per client address
    state: Arc<RwLock<HashMap<String, AttemptState>>>,
}

impl AttemptLimiter {
    /// Create a new limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a client may present a token right now.
    ///
    /// Returns `Ok(())` if allowed, or `Err(duration)` with the remaining
    /// cooldown time if the client is still cooling down.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        let now = SystemTime::now();
        let state = self.state.read().unwrap();

        if let Some(attempt) = state.get(client) {
            let cooldown = Duration::from_secs(cooldown_secs(attempt.failure_count));
            let elapsed = now
                .duration_since(attempt.last_failure)
                .unwrap_or(Duration::ZERO);

            if elapsed < cooldown {
                return Err(cooldown - elapsed);
            }
        }

        Ok(())
    }

    /// Record an invalid token attempt from a client.
    ///
    /// Escalates the client's tier, or restarts at tier one if the previous
    /// cooldown had fully expired.
    pub fn record_failure(&self, client: &str) {
        let now = SystemTime::now();
        let mut state = self.state.write().unwrap();

        let attempt = state.entry(client.to_string()).or_insert(AttemptState {
            failure_count: 0,
            last_failure: now,
        });

        let cooldown = Duration::from_secs(cooldown_secs(attempt.failure_count));
        let elapsed = now
            .duration_since(attempt.last_failure)
            .unwrap_or(Duration::ZERO);

        if elapsed >= cooldown.max(Duration::from_secs(COOLDOWN_TIERS[1])) {
            attempt.failure_count = 1;
        } else {
            attempt.failure_count += 1;
        }

        attempt.last_failure = now;
    }

    /// Record a successful validation: the client's slate is cleared.
    pub fn record_success(&self, client: &str) {
        let mut state = self.state.write().unwrap();
        state.remove(client);
    }

    /// Reset all limiter state (test surface).
    pub fn reset_all(&self) {
        let mut state = self.state.write().unwrap();
        state.clear();
    }
}

/// Cooldown in seconds applied after `failure_count` consecutive failures.
fn cooldown_secs(failure_count: u32) -> u64 {
    let index = failure_count as usize;
    if index >= COOLDOWN_TIERS.len() {
        COOLDOWN_TIERS[COOLDOWN_TIERS.len() - 1]
    } else {
        COOLDOWN_TIERS[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_allowed() {
        let limiter = AttemptLimiter::new();
        assert!(limiter.check("10.0.0.1").is_ok());
    }

    #[test]
    fn test_second_attempt_after_failure_cools_down() {
        let limiter = AttemptLimiter::new();

        limiter.record_failure("10.0.0.1");

        let result = limiter.check("10.0.0.1");
        assert!(result.is_err());
        let remaining = result.unwrap_err();
        assert!(remaining.as_secs() <= 2, "tier two is 2 seconds");
    }

    #[test]
    fn test_escalation_reaches_max_tier() {
        let limiter = AttemptLimiter::new();

        // Drive the count past the table; the cap must hold at 5 minutes
        {
            let mut state = limiter.state.write().unwrap();
            state.insert(
                "10.0.0.1".to_string(),
                AttemptState {
                    failure_count: 40,
                    last_failure: SystemTime::now(),
                },
            );
        }

        let remaining = limiter.check("10.0.0.1").unwrap_err();
        assert!(remaining.as_secs() <= 300);
        assert!(remaining.as_secs() > 290);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = AttemptLimiter::new();

        limiter.record_failure("10.0.0.1");
        limiter.record_failure("10.0.0.1");

        assert!(limiter.check("10.0.0.1").is_err());
        assert!(limiter.check("10.0.0.2").is_ok(), "other clients unaffected");
    }

    #[test]
    fn test_success_clears_slate() {
        let limiter = AttemptLimiter::new();

        limiter.record_failure("10.0.0.1");
        limiter.record_failure("10.0.0.1");
        assert!(limiter.check("10.0.0.1").is_err());

        limiter.record_success("10.0.0.1");
        assert!(limiter.check("10.0.0.1").is_ok());
    }

    #[test]
    fn test_expired_cooldown_restarts_at_tier_one() {
        let limiter = AttemptLimiter::new();

        // A failure long in the past, well beyond its cooldown
        {
            let mut state = limiter.state.write().unwrap();
            state.insert(
                "10.0.0.1".to_string(),
                AttemptState {
                    failure_count: 4,
                    last_failure: SystemTime::now() - Duration::from_secs(3600),
                },
            );
        }

        assert!(limiter.check("10.0.0.1").is_ok(), "cooldown long expired");

        // The next failure restarts the ladder instead of escalating
        limiter.record_failure("10.0.0.1");
        let state = limiter.state.read().unwrap();
        assert_eq!(state.get("10.0.0.1").unwrap().failure_count, 1);
    }

    #[test]
    fn test_reset_all() {
        let limiter = AttemptLimiter::new();
        limiter.record_failure("10.0.0.1");
        limiter.record_failure("10.0.0.2");

        limiter.reset_all();
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.2").is_ok());
    }
}
