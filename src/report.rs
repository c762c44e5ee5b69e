//! End-of-run statistics and invariant checks.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::consumer::ConsumerState;
use crate::pipeline::Outcome;
use crate::types::{ConsumerId, ItemId, ItemStatus, ProducerId};

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
pub fn cpu_times_seconds() -> Option<(f64, f64)> {
    // SAFETY: rusage is plain old data; an all-zero value is valid and
    // getrusage only writes through the pointer we hand it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let user = usage.ru_utime.tv_sec as f64 + (usage.ru_utime.tv_usec as f64 / 1_000_000.0);
    let sys = usage.ru_stime.tv_sec as f64 + (usage.ru_stime.tv_usec as f64 / 1_000_000.0);
    Some((user, sys))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
pub fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Final counts for one run.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub config: PipelineConfig,
    pub admitted: usize,
    pub rejected: usize,
    pub completed: usize,
    /// Completed items grouped by the producer that created them.
    pub per_producer: BTreeMap<ProducerId, usize>,
    /// Completed items grouped by the consumer that finished them.
    pub per_consumer: BTreeMap<ConsumerId, usize>,
    pub saturation_min_ms: u128,
    pub saturation_max_ms: u128,
    pub high_water: usize,
    pub threads_created: usize,
    pub elapsed_ms: u128,
    pub cpu_user_s: Option<f64>,
    pub cpu_sys_s: Option<f64>,
}

impl Report {
    /// Summarise `outcome`; `cpu` is the (user, sys) delta over the run.
    pub fn new(outcome: &Outcome, cpu: Option<(f64, f64)>) -> Self {
        let producers = outcome.config.producers as ProducerId;
        let consumers = outcome.config.consumers as ConsumerId;
        // Idle actors still get a zero row.
        let mut per_producer: BTreeMap<ProducerId, usize> =
            (0..producers).map(|id| (id, 0)).collect();
        let mut per_consumer: BTreeMap<ConsumerId, usize> =
            (0..consumers).map(|id| (id, 0)).collect();
        for item in outcome
            .completions
            .iter()
            .filter(|item| item.status == ItemStatus::Done)
        {
            *per_producer.entry(item.producer).or_default() += 1;
            if let Some(consumer) = item.consumer {
                *per_consumer.entry(consumer).or_default() += 1;
            }
        }

        Self {
            config: outcome.config.clone(),
            admitted: outcome.admitted(),
            rejected: outcome.rejected(),
            completed: outcome.completed(),
            per_producer,
            per_consumer,
            saturation_min_ms: outcome.saturation.min.as_millis(),
            saturation_max_ms: outcome.saturation.max.as_millis(),
            high_water: outcome.high_water,
            threads_created: outcome.threads_created,
            elapsed_ms: outcome.elapsed.as_millis(),
            cpu_user_s: cpu.map(|(user, _)| user),
            cpu_sys_s: cpu.map(|(_, sys)| sys),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RUN SUMMARY")?;
        writeln!(
            f,
            "capacity={} ceiling={} producers={} consumers={}",
            self.config.capacity, self.config.ceiling, self.config.producers, self.config.consumers
        )?;
        writeln!(f, "admitted={}", self.admitted)?;
        writeln!(f, "rejected={}", self.rejected)?;
        writeln!(f, "completed={}", self.completed)?;
        writeln!(f, "per_producer_completed={:?}", self.per_producer)?;
        writeln!(f, "per_consumer_completed={:?}", self.per_consumer)?;
        writeln!(f, "saturation_min_ms={}", self.saturation_min_ms)?;
        writeln!(f, "saturation_max_ms={}", self.saturation_max_ms)?;
        writeln!(f, "buffer_high_water={}", self.high_water)?;
        writeln!(f, "threads_created={}", self.threads_created)?;
        write!(f, "elapsed_ms={}", self.elapsed_ms)
    }
}

/// A broken pipeline invariant found after the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Violation {
    #[error("buffer held {observed} items, capacity {capacity}")]
    OverCapacity { observed: usize, capacity: usize },

    #[error("item {0} is in neither ledger")]
    MissingItem(ItemId),

    #[error("item {0} appears more than once across the ledgers")]
    DuplicateItem(ItemId),

    #[error("item {0} is outside the issued range")]
    UnexpectedItem(ItemId),

    #[error("item {id} finished as {status}")]
    Unfinished { id: ItemId, status: ItemStatus },

    #[error("consumer {id} ended in {state:?}")]
    ConsumerNotTerminated { id: ConsumerId, state: ConsumerState },

    #[error("{0} items left in the buffer")]
    Leftover(usize),
}

/// Check the end-of-run invariants; an empty list means a clean run.
pub fn validate(outcome: &Outcome) -> Vec<Violation> {
    let mut violations = Vec::new();
    let capacity = outcome.config.capacity;
    if outcome.high_water > capacity {
        violations.push(Violation::OverCapacity {
            observed: outcome.high_water,
            capacity,
        });
    }

    let mut seen: HashMap<ItemId, usize> = HashMap::new();
    for item in outcome.completions.iter().chain(outcome.rejections.iter()) {
        *seen.entry(item.id).or_default() += 1;
    }
    for id in 1..=outcome.issued {
        match seen.remove(&id) {
            None => violations.push(Violation::MissingItem(id)),
            Some(1) => {}
            Some(_) => violations.push(Violation::DuplicateItem(id)),
        }
    }
    let mut stray: Vec<ItemId> = seen.into_keys().collect();
    stray.sort_unstable();
    violations.extend(stray.into_iter().map(Violation::UnexpectedItem));

    for item in &outcome.completions {
        if item.status != ItemStatus::Done {
            violations.push(Violation::Unfinished {
                id: item.id,
                status: item.status,
            });
        }
    }
    for consumer in &outcome.consumers {
        if consumer.state != ConsumerState::Terminated {
            violations.push(Violation::ConsumerNotTerminated {
                id: consumer.id,
                state: consumer.state,
            });
        }
    }
    if outcome.leftover > 0 {
        violations.push(Violation::Leftover(outcome.leftover));
    }
    violations
}
