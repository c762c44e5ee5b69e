//! Shared record of every claimed item and its progress.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::LedgerError;
use crate::types::{ConsumerId, ItemId, ItemStatus, WorkItem};

/// Claimed items keyed by identifier. Entries are never removed.
pub struct CompletionLedger {
    entries: Mutex<BTreeMap<ItemId, WorkItem>>,
}

impl CompletionLedger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record that `consumer` has taken `item`; it shows as in progress.
    pub fn mark_claimed(
        &self,
        mut item: WorkItem,
        consumer: ConsumerId,
    ) -> Result<(), LedgerError> {
        let mut guard = self.entries.lock().expect("completion ledger mutex poisoned");
        if let Some(existing) = guard.get(&item.id) {
            return Err(LedgerError::DuplicateClaim {
                id: item.id,
                holder: existing.consumer,
            });
        }
        item.advance(ItemStatus::InProgress)?;
        item.consumer = Some(consumer);
        guard.insert(item.id, item);
        Ok(())
    }

    /// Move a claimed item to done.
    pub fn mark_done(&self, id: ItemId) -> Result<(), LedgerError> {
        let mut guard = self.entries.lock().expect("completion ledger mutex poisoned");
        let entry = guard.get_mut(&id).ok_or(LedgerError::UnknownItem(id))?;
        entry.advance(ItemStatus::Done)
    }

    #[cfg(test)]
    pub fn status(&self, id: ItemId) -> Option<ItemStatus> {
        let guard = self.entries.lock().expect("completion ledger mutex poisoned");
        guard.get(&id).map(|item| item.status)
    }

    /// Copy of every entry, ordered by identifier.
    pub fn snapshot(&self) -> Vec<WorkItem> {
        let guard = self.entries.lock().expect("completion ledger mutex poisoned");
        guard.values().cloned().collect()
    }

    /// Entries split into (in progress, done).
    pub fn partitioned(&self) -> (Vec<WorkItem>, Vec<WorkItem>) {
        self.snapshot()
            .into_iter()
            .partition(|item| item.status == ItemStatus::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::SystemTime;

    fn pending(id: ItemId) -> WorkItem {
        WorkItem::new(id, "nuggets", 0, SystemTime::now())
    }

    #[test]
    fn claim_then_done() {
        let ledger = CompletionLedger::new();
        ledger.mark_claimed(pending(1), 3).unwrap();
        assert_eq!(ledger.status(1), Some(ItemStatus::InProgress));
        ledger.mark_done(1).unwrap();
        assert_eq!(ledger.status(1), Some(ItemStatus::Done));

        let entries = ledger.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].consumer, Some(3));
    }

    #[test]
    fn duplicate_claim_is_refused() {
        let ledger = CompletionLedger::new();
        ledger.mark_claimed(pending(5), 1).unwrap();
        let err = ledger.mark_claimed(pending(5), 2).unwrap_err();
        assert_eq!(err, LedgerError::DuplicateClaim { id: 5, holder: Some(1) });
        // The original holder keeps the entry.
        assert_eq!(ledger.snapshot()[0].consumer, Some(1));
    }

    #[test]
    fn done_requires_a_claim() {
        let ledger = CompletionLedger::new();
        assert_eq!(ledger.mark_done(9), Err(LedgerError::UnknownItem(9)));
    }

    #[test]
    fn done_twice_is_refused() {
        let ledger = CompletionLedger::new();
        ledger.mark_claimed(pending(4), 0).unwrap();
        ledger.mark_done(4).unwrap();
        assert!(matches!(
            ledger.mark_done(4),
            Err(LedgerError::InvalidTransition { id: 4, .. })
        ));
    }

    #[test]
    fn snapshots_are_detached_copies() {
        let ledger = CompletionLedger::new();
        ledger.mark_claimed(pending(1), 0).unwrap();
        let before = ledger.snapshot();
        ledger.mark_done(1).unwrap();
        assert_eq!(before[0].status, ItemStatus::InProgress);
        let (in_progress, done) = ledger.partitioned();
        assert!(in_progress.is_empty());
        assert_eq!(done.len(), 1);
    }

    #[test]
    fn concurrent_consumers_own_disjoint_entries() {
        let ledger = Arc::new(CompletionLedger::new());
        let consumers = 4;
        let barrier = Arc::new(Barrier::new(consumers));
        let mut handles = Vec::new();
        for consumer in 0..consumers as u64 {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                for n in 0..20 {
                    let id = consumer * 1000 + n;
                    ledger.mark_claimed(pending(id), consumer).unwrap();
                    ledger.mark_done(id).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().expect("consumer thread panicked");
        }
        let entries = ledger.snapshot();
        assert_eq!(entries.len(), 80);
        assert!(entries.iter().all(|item| item.status == ItemStatus::Done));
        assert!(entries.windows(2).all(|pair| pair[0].id < pair[1].id));
    }
}
