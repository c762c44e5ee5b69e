//! Identifier issuing against the global ceiling, and the shutdown signal.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::buffer::BoundedBuffer;
use crate::types::ItemId;

/// Hands out identifiers `1..=ceiling` and owns the one-shot shutdown flag.
pub struct TerminationCoordinator {
    next_id: AtomicU64,
    ceiling: u64,
    signaled: AtomicBool,
}

impl TerminationCoordinator {
    pub fn new(ceiling: u64) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ceiling,
            signaled: AtomicBool::new(false),
        }
    }

    /// Take the next identifier, or `None` once the ceiling is exceeded.
    ///
    /// Increment and check are one atomic step, so no two callers can both
    /// believe they got the last slot.
    pub fn issue(&self) -> Option<ItemId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        (id <= self.ceiling).then_some(id)
    }

    /// Set the flag and close the buffer. Only the first call returns `true`.
    pub fn signal(&self, buffer: &BoundedBuffer) -> bool {
        let first = !self.signaled.swap(true, Ordering::SeqCst);
        // Closing is idempotent; repeat callers still guarantee waiters wake.
        buffer.shutdown();
        if first {
            log::info!("[SHUTDOWN] ceiling of {} items reached", self.ceiling);
        }
        first
    }

    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }

    /// Identifiers handed out so far, capped at the ceiling.
    pub fn issued(&self) -> u64 {
        self.next_id
            .load(Ordering::SeqCst)
            .saturating_sub(1)
            .min(self.ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    #[test]
    fn issues_up_to_ceiling_then_stops() {
        let coordinator = TerminationCoordinator::new(3);
        assert_eq!(coordinator.issue(), Some(1));
        assert_eq!(coordinator.issue(), Some(2));
        assert_eq!(coordinator.issue(), Some(3));
        assert_eq!(coordinator.issue(), None);
        assert_eq!(coordinator.issue(), None);
        assert_eq!(coordinator.issued(), 3);
    }

    #[test]
    fn concurrent_issue_never_exceeds_ceiling() {
        let ceiling = 50;
        let coordinator = Arc::new(TerminationCoordinator::new(ceiling));
        let issuers = 8;
        let barrier = Arc::new(Barrier::new(issuers));
        let seen: Arc<Mutex<HashSet<ItemId>>> = Arc::new(Mutex::new(HashSet::new()));
        let mut handles = Vec::new();
        for _ in 0..issuers {
            let coordinator = Arc::clone(&coordinator);
            let barrier = Arc::clone(&barrier);
            let seen = Arc::clone(&seen);
            handles.push(thread::spawn(move || {
                barrier.wait();
                while let Some(id) = coordinator.issue() {
                    assert!(seen.lock().expect("seen mutex poisoned").insert(id));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("issuer thread panicked");
        }
        let seen = seen.lock().expect("seen mutex poisoned");
        assert_eq!(seen.len(), ceiling as usize);
        assert!(seen.iter().all(|&id| (1..=ceiling).contains(&id)));
    }

    #[test]
    fn signal_is_idempotent_and_closes_buffer() {
        let coordinator = TerminationCoordinator::new(1);
        let buffer = BoundedBuffer::new(1);
        assert!(!coordinator.is_signaled());
        assert!(coordinator.signal(&buffer));
        assert!(!coordinator.signal(&buffer));
        assert!(coordinator.is_signaled());
        assert!(buffer.is_closed());
    }
}
