// Request deduplication guard: a shared set of recently-seen
// `(timestamp, ip, auth_rand)` fingerprints, cleared every 15-30s with
// jitter so it never grows unbounded.

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Fingerprint {
    pub timestamp: i64,
    pub ip: String,
    pub auth_rand: u64,
}

#[derive(Default)]
pub struct DedupGuard {
    seen: RwLock<HashSet<Fingerprint>>,
}

impl DedupGuard {
    pub fn new() -> DedupGuard {
        DedupGuard::default()
    }

    /// Returns `true` if this fingerprint is new (request admitted), `false`
    /// if it's a repeat (request should be rejected as a duplicate).
    pub fn admit(&self, fingerprint: Fingerprint) -> bool {
        let mut seen = self.seen.write();
        seen.insert(fingerprint)
    }

    pub fn clear(&self) {
        self.seen.write().clear();
    }

    pub fn len(&self) -> usize {
        self.seen.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs until the returned task is dropped/aborted, clearing `guard` on a
/// jittered 15-30s cadence.
pub fn spawn_clear_loop(guard: std::sync::Arc<DedupGuard>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let jitter_secs = rand::thread_rng().gen_range(15..=30);
            tokio::time::sleep(Duration::from_secs(jitter_secs)).await;
            guard.clear();
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_sighting_is_admitted_repeat_is_not() {
        let guard = DedupGuard::new();
        let fp = Fingerprint {
            timestamp: 1,
            ip: "10.0.0.1".to_string(),
            auth_rand: 42,
        };
        assert!(guard.admit(fp.clone()));
        assert!(!guard.admit(fp));
    }

    #[test]
    fn clear_forgets_prior_sightings() {
        let guard = DedupGuard::new();
        let fp = Fingerprint {
            timestamp: 1,
            ip: "10.0.0.1".to_string(),
            auth_rand: 42,
        };
        guard.admit(fp.clone());
        guard.clear();
        assert!(guard.admit(fp));
    }
}
