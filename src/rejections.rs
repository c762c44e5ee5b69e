//! Append-only record of rejected items and buffer saturation intervals.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::types::{ItemStatus, WorkItem};

/// Shortest and longest gap between consecutive rejections.
///
/// Both stay zero until at least two rejections have been recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SaturationStats {
    pub rejections: usize,
    pub min: Duration,
    pub max: Duration,
}

struct RejectionState {
    records: Vec<WorkItem>,
    last_rejection: Option<Instant>,
    min: Option<Duration>,
    max: Duration,
}

/// Thread-safe rejection ledger.
pub struct RejectionLedger {
    state: Mutex<RejectionState>,
}

impl RejectionLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RejectionState {
                records: Vec::new(),
                last_rejection: None,
                min: None,
                max: Duration::ZERO,
            }),
        }
    }

    /// Store a rejected item and fold the gap since the previous rejection
    /// into the saturation statistics.
    ///
    /// The timestamp is taken under the ledger lock so record order and
    /// timestamp order agree across producers.
    pub fn record(&self, item: WorkItem) {
        let mut guard = self.state.lock().expect("rejection ledger mutex poisoned");
        Self::fold(&mut guard, item, Instant::now());
    }

    #[cfg(test)]
    fn record_at(&self, item: WorkItem, at: Instant) {
        let mut guard = self.state.lock().expect("rejection ledger mutex poisoned");
        Self::fold(&mut guard, item, at);
    }

    fn fold(guard: &mut RejectionState, item: WorkItem, at: Instant) {
        debug_assert_eq!(item.status, ItemStatus::Pending, "rejected item left pending");
        if let Some(previous) = guard.last_rejection {
            let gap = at.saturating_duration_since(previous);
            guard.min = Some(guard.min.map_or(gap, |min| min.min(gap)));
            guard.max = guard.max.max(gap);
        }
        guard.last_rejection = Some(at);
        guard.records.push(item);
    }

    /// Copy of every rejected item, in rejection order.
    pub fn snapshot(&self) -> Vec<WorkItem> {
        let guard = self.state.lock().expect("rejection ledger mutex poisoned");
        guard.records.clone()
    }

    pub fn stats(&self) -> SaturationStats {
        let guard = self.state.lock().expect("rejection ledger mutex poisoned");
        SaturationStats {
            rejections: guard.records.len(),
            min: guard.min.unwrap_or(Duration::ZERO),
            max: guard.max,
        }
    }
}
