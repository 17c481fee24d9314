use std::time::Duration;

/// Doubling restart delay with a ceiling.
///
/// After `n` consecutive failures the delay is `min(base * 2^(n-1), cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            current: base.min(cap),
        }
    }

    /// Delay to wait before the next restart.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Record a restart; the next delay doubles, up to the cap.
    pub fn advance(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.cap);
    }

    /// The process stayed healthy; start over from the base delay.
    pub fn reset(&mut self) {
        self.current = self.base.min(self.cap);
    }

    pub fn is_at_base(&self) -> bool {
        self.current == self.base.min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn nth_delay_doubles_until_cap() {
        let mut backoff = Backoff::new(secs(5), secs(60));
        let mut delays = Vec::new();
        for _ in 0..6 {
            delays.push(backoff.current());
            backoff.advance();
        }
        assert_eq!(delays, vec![secs(5), secs(10), secs(20), secs(40), secs(60), secs(60)]);
    }

    #[test]
    fn matches_closed_form() {
        let base = Duration::from_millis(300);
        let cap = secs(7);
        let mut backoff = Backoff::new(base, cap);
        for n in 1..=12u32 {
            assert_eq!(backoff.current(), (base * 2u32.pow(n - 1)).min(cap), "failure #{n}");
            backoff.advance();
        }
    }

    #[test]
    fn reset_returns_to_base() {
        let mut backoff = Backoff::new(secs(5), secs(60));
        backoff.advance();
        backoff.advance();
        assert!(!backoff.is_at_base());
        backoff.reset();
        assert_eq!(backoff.current(), secs(5));
        assert!(backoff.is_at_base());
    }

    #[test]
    fn base_above_cap_is_clamped() {
        let backoff = Backoff::new(secs(90), secs(60));
        assert_eq!(backoff.current(), secs(60));
    }
}
