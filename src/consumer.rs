//! Consumer actor: claims items, simulates service time, records completion.

use std::sync::Arc;
use std::thread;

use serde::Serialize;

use crate::buffer::Claim;
use crate::pipeline::{PipelineContext, PipelineEvent};
use crate::types::{ConsumerId, ItemId};

/// Where a consumer is in its loop. `Terminated` is only reached from a
/// wait that observed `Claim::Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConsumerState {
    Waiting,
    Processing(ItemId),
    Terminated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConsumerSummary {
    pub id: ConsumerId,
    pub completed: usize,
    pub state: ConsumerState,
}

pub struct Consumer {
    id: ConsumerId,
    ctx: Arc<PipelineContext>,
    state: ConsumerState,
}

impl Consumer {
    pub fn new(id: ConsumerId, ctx: Arc<PipelineContext>) -> Self {
        Self {
            id,
            ctx,
            state: ConsumerState::Waiting,
        }
    }

    /// Claim and process items until the buffer reports closed.
    pub fn run(mut self) -> ConsumerSummary {
        self.ctx.thread_started();
        let mut completed = 0usize;

        while self.state != ConsumerState::Terminated {
            self.state = ConsumerState::Waiting;
            let item = match self.ctx.buffer.claim() {
                Claim::Item(item) => item,
                Claim::Closed => {
                    self.state = ConsumerState::Terminated;
                    continue;
                }
            };
            let id = item.id;
            self.state = ConsumerState::Processing(id);

            // Visible as in progress before the blocking service step.
            if let Err(err) = self.ctx.completions.mark_claimed(item, self.id) {
                log::error!("[CONSUMER] consumer {} could not claim item {id}: {err}", self.id);
                debug_assert!(false, "claim bookkeeping failed: {err}");
                continue;
            }
            log::debug!("[CONSUMER] consumer {} claimed item {id}", self.id);
            self.ctx.publish(PipelineEvent::Claimed {
                id,
                consumer: self.id,
            });

            thread::sleep(self.ctx.delays.delay(&self.ctx.config.processing));

            if let Err(err) = self.ctx.completions.mark_done(id) {
                log::error!("[CONSUMER] consumer {} could not finish item {id}: {err}", self.id);
                debug_assert!(false, "completion bookkeeping failed: {err}");
                continue;
            }
            completed += 1;
            log::debug!("[CONSUMER] consumer {} finished item {id}", self.id);
            self.ctx.publish(PipelineEvent::Completed {
                id,
                consumer: self.id,
            });
        }

        log::debug!("[CONSUMER] consumer {} terminated after {completed} items", self.id);
        ConsumerSummary {
            id: self.id,
            completed,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::timing::{DelayRange, FixedDelays};
    use crate::types::{ItemStatus, WorkItem};
    use std::sync::mpsc;
    use std::time::{Duration, SystemTime};

    fn context(capacity: usize) -> Arc<PipelineContext> {
        let config = PipelineConfig::default()
            .with_capacity(capacity)
            .with_processing(DelayRange::fixed(1));
        Arc::new(PipelineContext::new(config, Arc::new(FixedDelays::new())))
    }

    fn admit(ctx: &PipelineContext, id: ItemId) {
        let item = WorkItem::new(id, "pie", 2, SystemTime::now());
        let permit = ctx.buffer.reserve().expect("buffer closed");
        assert_eq!(permit.try_admit(item), crate::buffer::Admission::Admitted);
    }

    #[test]
    fn drains_queue_then_terminates_on_close() {
        let ctx = context(4);
        for id in 1..=3 {
            admit(&ctx, id);
        }
        ctx.buffer.shutdown();

        let summary = Consumer::new(5, Arc::clone(&ctx)).run();
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.state, ConsumerState::Terminated);

        let entries = ctx.completions.snapshot();
        assert_eq!(entries.len(), 3);
        assert!(entries
            .iter()
            .all(|item| item.status == ItemStatus::Done && item.consumer == Some(5)));
    }

    #[test]
    fn marks_in_progress_before_processing() {
        let config = PipelineConfig::default()
            .with_capacity(1)
            .with_processing(DelayRange::fixed(300));
        let ctx = Arc::new(PipelineContext::new(config, Arc::new(FixedDelays::new())));
        admit(&ctx, 1);

        let (done_tx, done_rx) = mpsc::channel();
        let consumer = Consumer::new(0, Arc::clone(&ctx));
        let handle = thread::spawn(move || {
            done_tx.send(consumer.run()).expect("send summary");
        });

        // Poll until the claim shows up; processing is still sleeping then.
        let mut status = None;
        for _ in 0..100 {
            status = ctx.completions.status(1);
            if status.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(status, Some(ItemStatus::InProgress));

        ctx.buffer.shutdown();
        let summary = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("consumer summary");
        assert_eq!(summary.completed, 1);
        assert_eq!(ctx.completions.status(1), Some(ItemStatus::Done));
        handle.join().expect("consumer thread panicked");
    }

    #[test]
    fn waiting_consumer_exits_on_shutdown() {
        let ctx = context(1);
        let (done_tx, done_rx) = mpsc::channel();
        let consumer = Consumer::new(1, Arc::clone(&ctx));
        let handle = thread::spawn(move || {
            done_tx.send(consumer.run()).expect("send summary");
        });

        // Still blocked: nothing to claim and not closed.
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        ctx.buffer.shutdown();

        let summary = done_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("consumer summary");
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.state, ConsumerState::Terminated);
        handle.join().expect("consumer thread panicked");
    }
}
