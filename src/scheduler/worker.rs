//! Worker thread lanes.
//!
//! A worker is a plain thread driving one task at a time, end to end: receive
//! a byte range, open the input file independently, stream its owned lines
//! through the primality oracle, report `{count, elapsed}` upstream. Workers
//! hold no shared state; the two channels are their entire interface.
//!
//! # Failure Containment
//!
//! Errors are caught at the task boundary, never retried locally. Both I/O
//! errors from the reader and panics out of the oracle (contained with
//! `catch_unwind`) turn into a single `Event::Failed` report, after which the
//! thread exits. The orchestrator requeues the task and spawns a replacement
//! lane under the same id — retry policy lives in exactly one place.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel as chan;

use super::task::{Task, TaskResult, WorkerId};
use crate::range_reader::IntegerLines;

/// Orchestrator-to-worker commands. The channel is bounded to 1: a lane never
/// has more than one task in flight.
#[derive(Debug)]
pub(crate) enum Command {
    Run(Task),
    Exit,
}

/// Worker-to-orchestrator reports.
#[derive(Debug)]
pub(crate) enum Event {
    Completed(TaskResult),
    /// The lane failed `task` and its thread is exiting.
    Failed {
        worker: WorkerId,
        task: Task,
        detail: String,
    },
}

/// Owning handle for one spawned lane.
pub(crate) struct WorkerHandle {
    tx: chan::Sender<Command>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Hand the lane its next task. Fails only if the thread is gone.
    pub(crate) fn dispatch(&self, task: Task) -> Result<(), ()> {
        self.tx.send(Command::Run(task)).map_err(drop)
    }

    /// Ask the lane to drain and terminate.
    ///
    /// `try_send`, never blocking: an idle lane has buffer space, and a lane
    /// that already failed (or still holds an undelivered command during an
    /// abort) terminates via channel disconnect in [`join`](Self::join).
    pub(crate) fn exit(&self) {
        let _ = self.tx.try_send(Command::Exit);
    }

    pub(crate) fn join(self) {
        // Disconnect the command channel first so the lane's recv loop ends
        // even if no Exit was delivered. Panics inside the lane are converted
        // to Failed events before the thread unwinds, so a join error here
        // has nothing left to add.
        drop(self.tx);
        let _ = self.join.join();
    }
}

/// Spawn one worker lane.
pub(crate) fn spawn_worker<F>(
    id: WorkerId,
    path: Arc<PathBuf>,
    oracle: Arc<F>,
    events: chan::Sender<Event>,
) -> io::Result<WorkerHandle>
where
    F: Fn(u64) -> bool + Send + Sync + 'static,
{
    let (tx, rx) = chan::bounded::<Command>(1);
    let join = thread::Builder::new()
        .name(format!("count-worker-{}", id.0))
        .spawn(move || worker_loop(id, &path, oracle.as_ref(), &rx, &events))?;
    Ok(WorkerHandle { tx, join })
}

fn worker_loop<F>(
    id: WorkerId,
    path: &Path,
    oracle: &F,
    rx: &chan::Receiver<Command>,
    events: &chan::Sender<Event>,
) where
    F: Fn(u64) -> bool + Sync,
{
    for cmd in rx.iter() {
        let task = match cmd {
            Command::Run(task) => task,
            Command::Exit => break,
        };

        let started = Instant::now();
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| count_range(path, task, oracle)));
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let event = match outcome {
            Ok(Ok(prime_count)) => Event::Completed(TaskResult {
                task,
                prime_count,
                elapsed_ms,
                worker: id,
            }),
            Ok(Err(err)) => Event::Failed {
                worker: id,
                task,
                detail: err.to_string(),
            },
            Err(payload) => Event::Failed {
                worker: id,
                task,
                detail: panic_detail(payload.as_ref()),
            },
        };

        let failed = matches!(event, Event::Failed { .. });
        if events.send(event).is_err() || failed {
            // Orchestrator gone, or this lane just reported its own death.
            return;
        }
    }
}

/// Count primes on the lines owned by `task`'s byte range.
fn count_range<F>(path: &Path, task: Task, oracle: &F) -> io::Result<u64>
where
    F: Fn(u64) -> bool,
{
    let mut count = 0u64;
    for item in IntegerLines::open(path, task.start, task.end)? {
        if oracle(item?) {
            count += 1;
        }
    }
    Ok(count)
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", s)
    } else {
        "worker panicked".to_string()
    }
}
