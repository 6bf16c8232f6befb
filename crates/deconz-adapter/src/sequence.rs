//! Transaction sequence number allocation

use std::sync::atomic::{AtomicU8, Ordering};

/// Allocator for APS request IDs and ZDP/ZCL transaction sequence numbers.
///
/// Pre-incrementing, wrapping 1..=255; zero is never issued. Collisions are
/// not tracked: the 60-second correlation timeout and the low concurrency
/// bound keep the live set far below 255.
#[derive(Debug, Default)]
pub struct TransactionSequence(AtomicU8);

impl TransactionSequence {
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Allocate the next sequence number.
    pub fn next(&self) -> u8 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = if current == 255 { 1 } else { current + 1 };
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one() {
        let sequence = TransactionSequence::new();
        assert_eq!(sequence.next(), 1);
        assert_eq!(sequence.next(), 2);
    }

    #[test]
    fn wraps_to_one_never_zero() {
        let sequence = TransactionSequence::new();
        for _ in 0..254 {
            sequence.next();
        }
        assert_eq!(sequence.next(), 255);
        assert_eq!(sequence.next(), 1);
    }

    #[test]
    fn distinct_within_a_full_cycle() {
        let sequence = TransactionSequence::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..255 {
            let id = sequence.next();
            assert_ne!(id, 0);
            assert!(seen.insert(id), "duplicate id {id} within 255 allocations");
        }
    }
}
