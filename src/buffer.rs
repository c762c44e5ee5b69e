//! Fixed-capacity FIFO buffer: non-blocking admission, blocking claim.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::types::WorkItem;

/// Outcome of an admission attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// The buffer was full; the item is handed back untouched.
    Rejected(WorkItem),
}

/// Outcome of a blocking claim.
#[derive(Debug, PartialEq, Eq)]
pub enum Claim {
    Item(WorkItem),
    /// Shut down, drained, and no admission still pending. Terminal.
    Closed,
}

/// Bounded buffer shared by every producer and consumer.
pub struct BoundedBuffer {
    inner: Mutex<BufferState>,
    available: Condvar,
    capacity: usize,
}

struct BufferState {
    queue: VecDeque<WorkItem>,
    closed: bool,
    // Producers that hold an identifier but have not decided admission yet.
    permits: usize,
    high_water: usize,
}

/// Held by a producer between asking for an identifier and deciding admission.
///
/// While any permit is outstanding, consumers keep waiting even after
/// shutdown, so an item numbered just under the ceiling is never stranded.
#[must_use = "dropping a permit abandons the admission"]
pub struct AdmissionPermit<'a> {
    buffer: &'a BoundedBuffer,
    settled: bool,
}

impl BoundedBuffer {
    /// Create an empty buffer holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "capacity must be > 0");
        Self {
            inner: Mutex::new(BufferState {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
                permits: 0,
                high_water: 0,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Start an admission; `None` once the buffer has been shut down.
    pub fn reserve(&self) -> Option<AdmissionPermit<'_>> {
        let mut guard = self.inner.lock().expect("buffer mutex poisoned");
        if guard.closed {
            return None;
        }
        guard.permits += 1;
        Some(AdmissionPermit {
            buffer: self,
            settled: false,
        })
    }

    /// Block until an item is available, or the buffer is closed and drained.
    pub fn claim(&self) -> Claim {
        let mut guard = self.inner.lock().expect("buffer mutex poisoned");
        loop {
            if let Some(item) = guard.queue.pop_front() {
                return Claim::Item(item);
            }
            if guard.closed && guard.permits == 0 {
                return Claim::Closed;
            }
            // Spurious wakes land here again and re-check both conditions.
            guard = self.available.wait(guard).expect("condvar wait failed");
        }
    }

    /// Close the buffer and wake every waiting consumer.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn shutdown(&self) -> bool {
        let mut guard = self.inner.lock().expect("buffer mutex poisoned");
        let first = !guard.closed;
        guard.closed = true;
        self.available.notify_all();
        if first {
            log::debug!(
                "[BUFFER] closed with {} queued, {} admissions pending",
                guard.queue.len(),
                guard.permits
            );
        }
        first
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("buffer mutex poisoned").closed
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("buffer mutex poisoned").queue.len()
    }

    /// Largest length ever observed.
    pub fn high_water(&self) -> usize {
        self.inner.lock().expect("buffer mutex poisoned").high_water
    }

    /// Copy of the queued items, head first.
    pub fn snapshot(&self) -> Vec<WorkItem> {
        let guard = self.inner.lock().expect("buffer mutex poisoned");
        guard.queue.iter().cloned().collect()
    }

    fn release_permit(&self, state: &mut BufferState) {
        debug_assert!(state.permits > 0, "admission permit underflow");
        state.permits -= 1;
        if state.closed && state.permits == 0 {
            // Waiters may now be able to observe Closed.
            self.available.notify_all();
        }
    }
}

impl AdmissionPermit<'_> {
    /// Append `item` if there is room, otherwise hand it back. Never blocks.
    pub fn try_admit(mut self, item: WorkItem) -> Admission {
        let buffer = self.buffer;
        let mut guard = buffer.inner.lock().expect("buffer mutex poisoned");
        self.settled = true;
        let outcome = if guard.queue.len() < buffer.capacity {
            guard.queue.push_back(item);
            let len = guard.queue.len();
            debug_assert!(len <= buffer.capacity, "buffer over capacity");
            guard.high_water = guard.high_water.max(len);
            buffer.available.notify_one();
            Admission::Admitted
        } else {
            Admission::Rejected(item)
        };
        buffer.release_permit(&mut guard);
        outcome
    }
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut guard = self.buffer.inner.lock().expect("buffer mutex poisoned");
        self.buffer.release_permit(&mut guard);
    }
}
