//! Producer actor: generates items at random intervals and sheds load when
//! the buffer is full.

use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use serde::Serialize;

use crate::buffer::Admission;
use crate::pipeline::{PipelineContext, PipelineEvent};
use crate::types::{ProducerId, WorkItem};

/// Per-producer admission counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProducerSummary {
    pub id: ProducerId,
    pub admitted: usize,
    pub rejected: usize,
}

pub struct Producer {
    id: ProducerId,
    ctx: Arc<PipelineContext>,
}

impl Producer {
    pub fn new(id: ProducerId, ctx: Arc<PipelineContext>) -> Self {
        Self { id, ctx }
    }

    /// Produce until the ceiling is crossed or shutdown is observed.
    pub fn run(self) -> ProducerSummary {
        let ctx = &self.ctx;
        ctx.thread_started();
        let mut summary = ProducerSummary {
            id: self.id,
            admitted: 0,
            rejected: 0,
        };

        while !ctx.termination.is_signaled() {
            thread::sleep(ctx.delays.delay(&ctx.config.arrival));

            let label = &ctx.config.labels[ctx.delays.pick(ctx.config.labels.len())];
            let created = SystemTime::now();

            // Shutdown may have happened while this producer slept.
            let Some(permit) = ctx.buffer.reserve() else {
                break;
            };
            let Some(id) = ctx.termination.issue() else {
                drop(permit);
                if ctx.termination.signal(&ctx.buffer) {
                    log::debug!("[PRODUCER] producer {} crossed the ceiling", self.id);
                }
                break;
            };

            let item = WorkItem::new(id, label.as_str(), self.id, created);
            match permit.try_admit(item) {
                Admission::Admitted => {
                    summary.admitted += 1;
                    log::debug!(
                        "[PRODUCER] producer {} admitted item {id} ({label})",
                        self.id
                    );
                    ctx.publish(PipelineEvent::Admitted {
                        id,
                        producer: self.id,
                    });
                }
                Admission::Rejected(item) => {
                    summary.rejected += 1;
                    log::debug!(
                        "[PRODUCER] producer {} rejected item {id}: buffer full",
                        self.id
                    );
                    ctx.rejections.record(item);
                    ctx.publish(PipelineEvent::Rejected {
                        id,
                        producer: self.id,
                    });
                }
            }
        }

        log::debug!(
            "[PRODUCER] producer {} stopped admitted={} rejected={}",
            self.id,
            summary.admitted,
            summary.rejected
        );
        summary
    }
}
