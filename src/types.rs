//! Shared identifiers and the work item model used across the pipeline.

use std::fmt;
use std::time::SystemTime;

use serde::Serialize;

use crate::error::LedgerError;

/// Globally unique, monotonically increasing work item identifier.
pub type ItemId = u64;
/// Identity of a producer thread.
pub type ProducerId = u64;
/// Identity of a consumer thread.
pub type ConsumerId = u64;

/// Lifecycle of a work item. Transitions only move forward one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ItemStatus {
    Pending,
    InProgress,
    Done,
}

impl ItemStatus {
    /// The only status this one may advance to.
    pub fn successor(self) -> Option<ItemStatus> {
        match self {
            ItemStatus::Pending => Some(ItemStatus::InProgress),
            ItemStatus::InProgress => Some(ItemStatus::Done),
            ItemStatus::Done => None,
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::InProgress => "in progress",
            ItemStatus::Done => "done",
        };
        f.write_str(name)
    }
}

/// One unit of work, handed from exactly one producer to at most one consumer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub id: ItemId,
    /// Category drawn from the configured label menu.
    pub label: String,
    pub producer: ProducerId,
    /// Unset until a consumer claims the item.
    pub consumer: Option<ConsumerId>,
    pub status: ItemStatus,
    pub created: SystemTime,
}

impl WorkItem {
    /// Construct a pending item that has not been claimed yet.
    pub fn new(
        id: ItemId,
        label: impl Into<String>,
        producer: ProducerId,
        created: SystemTime,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            producer,
            consumer: None,
            status: ItemStatus::Pending,
            created,
        }
    }

    /// Move to `next`, refusing skips and regressions.
    pub fn advance(&mut self, next: ItemStatus) -> Result<(), LedgerError> {
        if self.status.successor() != Some(next) {
            return Err(LedgerError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
