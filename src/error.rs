//! Error types for configuration and ledger bookkeeping.

use thiserror::Error;

use crate::types::{ConsumerId, ItemId, ItemStatus};

/// Rejected pipeline configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("buffer capacity must be > 0")]
    ZeroCapacity,

    #[error("item ceiling must be > 0")]
    ZeroCeiling,

    #[error("{0} count must be > 0")]
    NoActors(&'static str),

    #[error("{name} delay range is inverted: {min_ms}ms > {max_ms}ms")]
    InvertedRange {
        name: &'static str,
        min_ms: u64,
        max_ms: u64,
    },

    #[error("label menu is empty")]
    EmptyMenu,
}

/// Bookkeeping faults. Under correct buffer semantics none of these occur.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("item {id} claimed twice (already held by consumer {holder:?})")]
    DuplicateClaim { id: ItemId, holder: Option<ConsumerId> },

    #[error("item {0} is not in the completion ledger")]
    UnknownItem(ItemId),

    #[error("item {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
    },
}
