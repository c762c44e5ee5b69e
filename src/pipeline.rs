//! Shared pipeline context, actor thread lifecycle, and snapshot publishing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::buffer::BoundedBuffer;
use crate::completions::CompletionLedger;
use crate::config::PipelineConfig;
use crate::consumer::{Consumer, ConsumerSummary};
use crate::producer::{Producer, ProducerSummary};
use crate::rejections::{RejectionLedger, SaturationStats};
use crate::termination::TerminationCoordinator;
use crate::timing::DelaySource;
use crate::types::{ConsumerId, ItemId, ItemStatus, ProducerId, WorkItem};

/// State change that triggers a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
    Admitted { id: ItemId, producer: ProducerId },
    Rejected { id: ItemId, producer: ProducerId },
    Claimed { id: ItemId, consumer: ConsumerId },
    Completed { id: ItemId, consumer: ConsumerId },
}

/// Read-only copies of every shared structure at one instant.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Queued items, head first.
    pub buffer: Vec<WorkItem>,
    pub rejected: Vec<WorkItem>,
    pub in_progress: Vec<WorkItem>,
    pub done: Vec<WorkItem>,
}

/// Receives a snapshot after every state change. Must not block for long:
/// it runs on the producer or consumer thread that caused the event.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &PipelineEvent, snapshot: &Snapshot);
}

/// Everything the actors share, threaded through their constructors.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub buffer: BoundedBuffer,
    pub rejections: RejectionLedger,
    pub completions: CompletionLedger,
    pub termination: TerminationCoordinator,
    pub delays: Arc<dyn DelaySource>,
    observer: Option<Arc<dyn Observer>>,
    threads_created: AtomicUsize,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig, delays: Arc<dyn DelaySource>) -> Self {
        Self {
            buffer: BoundedBuffer::new(config.capacity),
            rejections: RejectionLedger::new(),
            completions: CompletionLedger::new(),
            termination: TerminationCoordinator::new(config.ceiling),
            delays,
            observer: None,
            threads_created: AtomicUsize::new(0),
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn snapshot(&self) -> Snapshot {
        let (in_progress, done) = self.completions.partitioned();
        Snapshot {
            buffer: self.buffer.snapshot(),
            rejected: self.rejections.snapshot(),
            in_progress,
            done,
        }
    }

    /// Notify the observer, if any, with a fresh snapshot.
    pub fn publish(&self, event: PipelineEvent) {
        if let Some(observer) = self.observer.as_ref() {
            let snapshot = self.snapshot();
            observer.on_event(&event, &snapshot);
        }
    }

    /// Called once at the top of every actor thread.
    pub fn thread_started(&self) {
        self.threads_created.fetch_add(1, Ordering::SeqCst);
    }

    pub fn threads_created(&self) -> usize {
        self.threads_created.load(Ordering::SeqCst)
    }
}

/// Everything observable once every actor thread has been joined.
#[derive(Clone, Debug)]
pub struct Outcome {
    pub config: PipelineConfig,
    pub producers: Vec<ProducerSummary>,
    pub consumers: Vec<ConsumerSummary>,
    /// Completion ledger entries ordered by identifier.
    pub completions: Vec<WorkItem>,
    pub rejections: Vec<WorkItem>,
    pub saturation: SaturationStats,
    pub issued: u64,
    pub high_water: usize,
    /// Items still queued after the run; zero unless something went wrong.
    pub leftover: usize,
    pub threads_created: usize,
    pub elapsed: Duration,
}

impl Outcome {
    pub fn admitted(&self) -> usize {
        self.producers.iter().map(|p| p.admitted).sum()
    }

    pub fn rejected(&self) -> usize {
        self.rejections.len()
    }

    pub fn completed(&self) -> usize {
        self.completions
            .iter()
            .filter(|item| item.status == ItemStatus::Done)
            .count()
    }
}

/// Spawn every producer and consumer, wait for all of them, and collect
/// the final state.
pub fn run(ctx: Arc<PipelineContext>) -> anyhow::Result<Outcome> {
    let start = Instant::now();
    log::info!(
        "[PIPELINE] start capacity={} ceiling={} producers={} consumers={}",
        ctx.config.capacity,
        ctx.config.ceiling,
        ctx.config.producers,
        ctx.config.consumers
    );

    let mut consumer_handles = Vec::with_capacity(ctx.config.consumers);
    let mut producer_handles = Vec::with_capacity(ctx.config.producers);
    let spawned = spawn_actors(&ctx, &mut consumer_handles, &mut producer_handles);
    if spawned.is_err() {
        // Let whatever did start wind down before reporting the failure.
        ctx.termination.signal(&ctx.buffer);
    }

    let mut producers = Vec::with_capacity(producer_handles.len());
    for handle in producer_handles {
        producers.push(
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("producer thread panicked"))?,
        );
    }
    let mut consumers = Vec::with_capacity(consumer_handles.len());
    for handle in consumer_handles {
        consumers.push(
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?,
        );
    }
    spawned?;

    let outcome = Outcome {
        config: ctx.config.clone(),
        producers,
        consumers,
        completions: ctx.completions.snapshot(),
        rejections: ctx.rejections.snapshot(),
        saturation: ctx.rejections.stats(),
        issued: ctx.termination.issued(),
        high_water: ctx.buffer.high_water(),
        leftover: ctx.buffer.len(),
        threads_created: ctx.threads_created(),
        elapsed: start.elapsed(),
    };
    log::info!(
        "[PIPELINE] finished in {}ms admitted={} rejected={} completed={}",
        outcome.elapsed.as_millis(),
        outcome.admitted(),
        outcome.rejected(),
        outcome.completed()
    );
    Ok(outcome)
}

fn spawn_actors(
    ctx: &Arc<PipelineContext>,
    consumers: &mut Vec<thread::JoinHandle<ConsumerSummary>>,
    producers: &mut Vec<thread::JoinHandle<ProducerSummary>>,
) -> anyhow::Result<()> {
    for consumer_id in 0..ctx.config.consumers as ConsumerId {
        let consumer = Consumer::new(consumer_id, Arc::clone(ctx));
        let handle = thread::Builder::new()
            .name(format!("consumer-{consumer_id}"))
            .spawn(move || consumer.run())
            .with_context(|| format!("failed to spawn consumer {consumer_id}"))?;
        consumers.push(handle);
    }
    for producer_id in 0..ctx.config.producers as ProducerId {
        let producer = Producer::new(producer_id, Arc::clone(ctx));
        let handle = thread::Builder::new()
            .name(format!("producer-{producer_id}"))
            .spawn(move || producer.run())
            .with_context(|| format!("failed to spawn producer {producer_id}"))?;
        producers.push(handle);
    }
    Ok(())
}
