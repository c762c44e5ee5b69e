//! Plain-text board for watching a run live.

use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::pipeline::{Observer, PipelineEvent, Snapshot};
use crate::types::ConsumerId;

/// Render queue, rejections, per-consumer work, and completions.
pub fn board(snapshot: &Snapshot, consumers: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Buffer ===");
    if snapshot.buffer.is_empty() {
        let _ = writeln!(out, "(empty)");
    }
    for (slot, item) in snapshot.buffer.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}) {} (id {}, producer {})",
            slot + 1,
            item.label,
            item.id,
            item.producer
        );
    }

    if !snapshot.rejected.is_empty() {
        let _ = writeln!(out, "\n--- Rejected ---");
        for item in &snapshot.rejected {
            let _ = writeln!(out, "{} (id {}, producer {})", item.label, item.id, item.producer);
        }
    }

    let _ = writeln!(out, "\n=== In Progress ===");
    for consumer in 0..consumers as ConsumerId {
        let held = snapshot
            .in_progress
            .iter()
            .find(|item| item.consumer == Some(consumer));
        match held {
            Some(item) => {
                let _ = writeln!(out, "consumer-{consumer}: {} (id {})", item.label, item.id);
            }
            None => {
                let _ = writeln!(out, "consumer-{consumer}: (free)");
            }
        }
    }

    let _ = writeln!(out, "\n=== Completed ===");
    for item in &snapshot.done {
        let consumer = item
            .consumer
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "id {} | {} | producer {} | consumer {consumer}",
            item.id, item.label, item.producer
        );
    }
    out
}

fn describe(event: &PipelineEvent) -> String {
    match *event {
        PipelineEvent::Admitted { id, producer } => {
            format!("producer {producer} admitted item {id}")
        }
        PipelineEvent::Rejected { id, producer } => {
            format!("producer {producer} rejected item {id}")
        }
        PipelineEvent::Claimed { id, consumer } => {
            format!("consumer {consumer} claimed item {id}")
        }
        PipelineEvent::Completed { id, consumer } => {
            format!("consumer {consumer} completed item {id}")
        }
    }
}

/// Prints the board after every event, to stdout unless told otherwise.
pub struct BoardObserver<W = io::Stdout> {
    consumers: usize,
    // Serialises whole boards so threads never interleave lines.
    out: Mutex<W>,
    write_failed: AtomicBool,
}

impl BoardObserver {
    pub fn new(consumers: usize) -> Self {
        Self::with_writer(consumers, io::stdout())
    }
}

impl<W: io::Write + Send> BoardObserver<W> {
    pub fn with_writer(consumers: usize, out: W) -> Self {
        Self {
            consumers,
            out: Mutex::new(out),
            write_failed: AtomicBool::new(false),
        }
    }
}

impl<W: io::Write + Send> Observer for BoardObserver<W> {
    fn on_event(&self, event: &PipelineEvent, snapshot: &Snapshot) {
        let text = board(snapshot, self.consumers);
        let mut out = self.out.lock().expect("board writer mutex poisoned");
        let written =
            writeln!(out, "\n>>> {}\n{text}", describe(event)).and_then(|()| out.flush());
        if let Err(err) = written {
            // Warn once per run.
            if !self.write_failed.swap(true, Ordering::Relaxed) {
                log::warn!("[PIPELINE] board output failed: {err}");
            }
        }
    }
}
