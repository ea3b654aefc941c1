// Request deadline, carried through every suspension point: a wall-clock
// deadline a running server checks at each point it would otherwise
// block, rather than a realm-local virtual clock.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Deadline {
        Deadline {
            expires_at: Instant::now() + timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// An async plugin invocation runs under its own derived deadline,
    /// independent of the request's own.
    pub fn derive_independent(timeout: Duration) -> Deadline {
        Deadline::after(timeout)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_deadline_is_not_expired() {
        let d = Deadline::after(Duration::from_secs(1));
        assert!(!d.is_expired());
        assert!(d.remaining() <= Duration::from_secs(1));
    }

    #[test]
    fn zero_timeout_is_expired() {
        let d = Deadline::after(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(1));
        assert!(d.is_expired());
    }
}
