//! Daily token budget, the one shared mutable resource in the system.
//!
//! Injected explicitly (tests get a fresh counter per run) and updated
//! atomically: concurrent parse requests reserve tokens with a CAS loop
//! so the budget cannot be raced past.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct TokenBudget {
    limit: u64,
    used: AtomicU64,
}

/// Rough chars-per-token heuristic for pre-call reservation.
const CHARS_PER_TOKEN: usize = 4;

pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() / CHARS_PER_TOKEN).max(1) as u64
}

impl TokenBudget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used())
    }

    /// Check-then-reserve `estimate` tokens. Fails without side effects
    /// when the reservation would exceed the limit; this is the hard
    /// cost ceiling, checked before any network call.
    pub fn try_reserve(&self, estimate: u64) -> Result<(), (u64, u64)> {
        let mut current = self.used.load(Ordering::SeqCst);
        loop {
            if current + estimate > self.limit {
                return Err((current, self.limit));
            }
            match self.used.compare_exchange(
                current,
                current + estimate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Replace a reservation's estimate with the provider-reported
    /// actual usage once a call completes.
    pub fn settle(&self, estimate: u64, actual: u64) {
        if actual >= estimate {
            self.used.fetch_add(actual - estimate, Ordering::SeqCst);
        } else {
            let give_back = estimate - actual;
            // fetch_update to avoid underflow if settles interleave
            let _ = self
                .used
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                    Some(used.saturating_sub(give_back))
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn reserve_within_limit_succeeds() {
        let budget = TokenBudget::new(1_000);
        assert!(budget.try_reserve(400).is_ok());
        assert!(budget.try_reserve(600).is_ok());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn reserve_past_limit_fails_without_consuming() {
        let budget = TokenBudget::new(1_000);
        budget.try_reserve(900).unwrap();
        let err = budget.try_reserve(200).unwrap_err();
        assert_eq!(err, (900, 1_000));
        assert_eq!(budget.used(), 900);
    }

    #[test]
    fn settle_adjusts_to_actual_usage() {
        let budget = TokenBudget::new(1_000);
        budget.try_reserve(500).unwrap();
        budget.settle(500, 320);
        assert_eq!(budget.used(), 320);

        budget.try_reserve(100).unwrap();
        budget.settle(100, 150);
        assert_eq!(budget.used(), 470);
    }

    #[test]
    fn concurrent_reservations_never_exceed_limit() {
        let budget = Arc::new(TokenBudget::new(1_000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let budget = Arc::clone(&budget);
            handles.push(thread::spawn(move || {
                let mut reserved = 0u64;
                for _ in 0..100 {
                    if budget.try_reserve(10).is_ok() {
                        reserved += 10;
                    }
                }
                reserved
            }));
        }
        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 1_000);
        assert_eq!(budget.used(), 1_000);
    }

    #[test]
    fn estimate_scales_with_length() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }
}
