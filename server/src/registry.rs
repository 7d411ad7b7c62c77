//! Process-wide record of which room instance owns a room name.
//!
//! Claims are best-effort and expire on their own; the room table in the
//! dispatcher stays the source of truth. A room that loses the claim race
//! marks itself non-primary and disposes early if nobody joins it.

use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Claim {
    instance: u64,
    claimed_at: Instant,
}

#[derive(Debug, Clone)]
pub struct RoomRegistry {
    claims: Arc<Mutex<HashMap<String, Claim>>>,
    ttl: Duration,
}

impl RoomRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            claims: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Claim>> {
        // A panic while holding the lock cannot leave a claim half-written.
        self.claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tries to become the primary instance for `name`. Succeeds when the
    /// name is unclaimed, the existing claim expired, or it is already ours.
    pub fn claim(&self, name: &str, instance: u64) -> bool {
        let mut claims = self.lock();
        let now = Instant::now();

        if let Some(existing) = claims.get(name) {
            let fresh = now.duration_since(existing.claimed_at) < self.ttl;
            if existing.instance != instance && fresh {
                warn!(
                    "Room '{}' already claimed by instance {:016x}; {:016x} is non-primary",
                    name, existing.instance, instance
                );
                return false;
            }
        }

        claims.insert(
            name.to_string(),
            Claim {
                instance,
                claimed_at: now,
            },
        );
        debug!("Room '{}' claimed by instance {:016x}", name, instance);
        true
    }

    /// Drops the claim, but only if `instance` still holds it.
    pub fn release(&self, name: &str, instance: u64) {
        let mut claims = self.lock();
        if claims.get(name).is_some_and(|c| c.instance == instance) {
            claims.remove(name);
            debug!("Room '{}' released by instance {:016x}", name, instance);
        }
    }

    pub fn holder(&self, name: &str) -> Option<u64> {
        let claims = self.lock();
        claims
            .get(name)
            .filter(|c| c.claimed_at.elapsed() < self.ttl)
            .map(|c| c.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_claim_wins() {
        let registry = RoomRegistry::new(Duration::from_secs(60));
        assert!(registry.claim("pitch", 1));
        assert!(!registry.claim("pitch", 2));
        assert_eq!(registry.holder("pitch"), Some(1));

        // Re-claiming our own name refreshes it.
        assert!(registry.claim("pitch", 1));
    }

    #[test]
    fn test_release_only_by_holder() {
        let registry = RoomRegistry::new(Duration::from_secs(60));
        registry.claim("pitch", 1);

        registry.release("pitch", 2);
        assert_eq!(registry.holder("pitch"), Some(1));

        registry.release("pitch", 1);
        assert_eq!(registry.holder("pitch"), None);
        assert!(registry.claim("pitch", 2));
    }

    #[test]
    fn test_expired_claim_can_be_taken_over() {
        let registry = RoomRegistry::new(Duration::ZERO);
        assert!(registry.claim("pitch", 1));
        assert_eq!(registry.holder("pitch"), None);
        assert!(registry.claim("pitch", 2));
    }

    #[test]
    fn test_clones_share_claims() {
        let registry = RoomRegistry::new(Duration::from_secs(60));
        let other = registry.clone();
        registry.claim("a", 7);
        assert!(!other.claim("a", 8));
        assert!(other.claim("b", 8));
    }
}
