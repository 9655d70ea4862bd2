//! Run orchestration: queues, dispatch, failure recovery, termination.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────────────────────────────────────┐
//!                 │                Orchestrator                   │
//!                 │  task_queue / failed_queue / rem_range        │
//!                 │  StatsBoard · TaskManager · aggregates        │
//!                 └──────┬──────────────────────────────▲─────────┘
//!        Run(Task)/Exit  │ per-lane bounded(1)          │ shared event channel
//!                        ▼                              │ Completed/Failed
//!            ┌───────────────────────┐      ┌───────────┴───────────┐
//!            │ count-worker-0        │      │ count-worker-N        │
//!            │ open → read → count   │ ...  │ open → read → count   │
//!            └───────────────────────┘      └───────────────────────┘
//! ```
//!
//! The orchestrator thread is the single owner of every queue, counter and
//! stat; workers only ever see their own task. One dispatch per idle lane
//! keeps in-flight work equal to the lane count, so no queue bound beyond the
//! initial partition is needed. The event channel is unbounded, but carries
//! at most one pending event per lane.
//!
//! # Dispatch Policy
//!
//! When a lane goes idle, in priority order:
//!
//! 1. pop the failed queue (FIFO) — recovery first;
//! 2. pop the task queue: LIFO normally, but a `Slow` lane takes the
//!    *smallest* queued task when at least two remain;
//! 3. mint an adaptive task from the remaining range, sized for the lane's
//!    class;
//! 4. nothing left: send `Exit`.
//!
//! # Failure Recovery
//!
//! A lane that reports `Failed` has already shut its thread down. Its
//! in-flight task goes to the failed queue, a fresh thread is spawned under
//! the same lane id (the stats row is preserved), and the replacement draws
//! its first task through the normal policy — which starts at the failed
//! queue. Every byte is therefore counted exactly once: a range is either
//! completed by exactly one lane or requeued untouched.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel as chan;

use super::errors::CountError;
use super::progress::ProgressReporter;
use super::task::{Task, TaskId, TaskResult, WorkerId};
use super::task_manager::TaskManager;
use super::worker::{self, Event, WorkerHandle};
use super::worker_stats::{PerfClass, StatsBoard};
use crate::primality;

// ============================================================================
// Configuration
// ============================================================================

/// Tuning for one counting run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Worker lanes to spawn (capped by the number of initial tasks).
    pub workers: usize,

    /// Emit 1 Hz progress blocks on stdout.
    pub progress: bool,

    /// Maximum failures tolerated per task before the run aborts.
    /// 0 means retry without bound.
    pub max_task_attempts: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            progress: false,
            max_task_attempts: 0,
        }
    }
}

impl RunConfig {
    /// Validate configuration. Panics on invalid values.
    pub fn validate(&self) {
        assert!(self.workers > 0, "workers must be > 0");
    }
}

// ============================================================================
// Report
// ============================================================================

/// Final per-lane summary.
#[derive(Clone, Debug)]
pub struct WorkerSummary {
    pub worker: WorkerId,
    pub tasks_completed: u64,
    pub primes_found: u64,
    pub avg_processing_ms: f64,
    pub class: PerfClass,
}

/// Everything a finished run has to say.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub prime_count: u64,
    pub elapsed_ms: u64,
    pub file_size: u64,
    /// Bytes covered by completed tasks. Equals `file_size` on success.
    pub bytes_processed: u64,
    pub tasks_completed: u64,
    pub workers_replaced: u64,
    pub global_avg_ms: f64,
    pub workers: Vec<WorkerSummary>,
}

// ============================================================================
// Entry points
// ============================================================================

/// Count the primes in `path` using the built-in oracle.
pub fn count_primes(path: &Path, cfg: &RunConfig) -> Result<RunReport, CountError> {
    count_primes_with_oracle(path, cfg, primality::is_prime)
}

/// Count with a caller-supplied oracle.
///
/// The oracle decides what "prime" means; tests inject sleeping or panicking
/// oracles to exercise the adaptive sizer and the failure path without
/// touching production code.
pub fn count_primes_with_oracle<F>(
    path: &Path,
    cfg: &RunConfig,
    oracle: F,
) -> Result<RunReport, CountError>
where
    F: Fn(u64) -> bool + Send + Sync + 'static,
{
    cfg.validate();
    let file_size = fs::metadata(path)
        .map_err(|e| CountError::input(path, e))?
        .len();
    Orchestrator::new(path.to_path_buf(), cfg, file_size, Arc::new(oracle)).run()
}

// ============================================================================
// Orchestrator
// ============================================================================

/// One worker lane slot. The handle turns over on replacement; the id and the
/// stats row do not.
struct Lane {
    handle: Option<WorkerHandle>,
    busy: bool,
}

struct Orchestrator<F> {
    path: Arc<PathBuf>,
    oracle: Arc<F>,
    max_task_attempts: u32,
    file_size: u64,

    minter: TaskManager,
    stats: StatsBoard,
    task_queue: Vec<Task>,
    failed_queue: VecDeque<Task>,
    /// File tail not yet minted into tasks. The default partition covers the
    /// whole file, so this starts `None`; the adaptive mint path serves any
    /// partition scheme that undercovers.
    rem_range: Option<(u64, u64)>,
    /// Failure count per task id, for the optional retry cap.
    attempts: HashMap<TaskId, u32>,

    lanes: Vec<Lane>,
    event_tx: chan::Sender<Event>,
    event_rx: chan::Receiver<Event>,

    prime_count: u64,
    bytes_processed: u64,
    tasks_completed: u64,
    workers_replaced: u64,
    started: Instant,
    progress: ProgressReporter,
}

impl<F> Orchestrator<F>
where
    F: Fn(u64) -> bool + Send + Sync + 'static,
{
    fn new(path: PathBuf, cfg: &RunConfig, file_size: u64, oracle: Arc<F>) -> Self {
        let mut minter = TaskManager::new();
        let mut task_queue = minter.initial_partition(file_size, cfg.workers);
        // Seed order is irrelevant to correctness (LIFO pops), but starting
        // from the front keeps early progress sequential on rotating media.
        task_queue.reverse();

        let lane_count = cfg.workers.min(task_queue.len());
        let (event_tx, event_rx) = chan::unbounded();

        Self {
            path: Arc::new(path),
            oracle,
            max_task_attempts: cfg.max_task_attempts,
            file_size,
            minter,
            stats: StatsBoard::new(lane_count),
            task_queue,
            failed_queue: VecDeque::new(),
            rem_range: None,
            attempts: HashMap::new(),
            lanes: (0..lane_count)
                .map(|_| Lane {
                    handle: None,
                    busy: false,
                })
                .collect(),
            event_tx,
            event_rx,
            prime_count: 0,
            bytes_processed: 0,
            tasks_completed: 0,
            workers_replaced: 0,
            started: Instant::now(),
            progress: ProgressReporter::new(cfg.progress),
        }
    }

    fn run(mut self) -> Result<RunReport, CountError> {
        let outcome = self.run_inner();
        // Tear the pool down on both paths so an abort never leaks threads.
        self.shutdown();
        outcome.map(|_| self.report())
    }

    fn run_inner(&mut self) -> Result<(), CountError> {
        // Spawn one lane per initial task, up to the configured width, and
        // hand each its first task.
        for idx in 0..self.lanes.len() {
            let id = WorkerId(idx);
            let handle = worker::spawn_worker(
                id,
                Arc::clone(&self.path),
                Arc::clone(&self.oracle),
                self.event_tx.clone(),
            )
            .map_err(CountError::Spawn)?;
            self.lanes[idx].handle = Some(handle);
            self.dispatch(id)?;
        }

        while !self.finished() {
            // `self` holds an event sender, so the channel cannot disconnect;
            // a recv error would mean the runtime is torn down already.
            let event = match self.event_rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            };
            match event {
                Event::Completed(result) => self.on_result(result)?,
                Event::Failed {
                    worker,
                    task,
                    detail,
                } => self.on_failure(worker, task, &detail)?,
            }
        }
        Ok(())
    }

    /// All lanes idle and nothing left to hand out.
    fn finished(&self) -> bool {
        !self.lanes.iter().any(|l| l.busy) && !self.work_remains()
    }

    fn work_remains(&self) -> bool {
        !self.task_queue.is_empty() || !self.failed_queue.is_empty() || self.rem_range.is_some()
    }

    // ------------------------------------------------------------------
    // Event handling
    // ------------------------------------------------------------------

    fn on_result(&mut self, result: TaskResult) -> Result<(), CountError> {
        self.prime_count += result.prime_count;
        self.bytes_processed += result.bytes_covered();
        self.stats.record_result(&result);
        self.minter.record(result.elapsed_ms);
        self.tasks_completed += 1;

        self.progress
            .maybe_emit(&self.stats, self.bytes_processed, self.file_size, self.started);

        self.lanes[result.worker.0].busy = false;
        self.dispatch(result.worker)
    }

    fn on_failure(
        &mut self,
        worker: WorkerId,
        task: Task,
        detail: &str,
    ) -> Result<(), CountError> {
        eprintln!("worker {} failed on task {}: {}", worker, task, detail);

        let failures = self.attempts.entry(task.id).or_insert(0);
        *failures += 1;
        if self.max_task_attempts > 0 && *failures >= self.max_task_attempts {
            return Err(CountError::AttemptsExhausted {
                task: task.id,
                attempts: *failures,
            });
        }

        // The in-flight slot holds the same task the worker reported; trust
        // the slot (it is authoritative for recovery) but fall back to the
        // report if a lane failed before tracking caught up.
        let lost = self.stats.take_current(worker).unwrap_or(task);
        self.failed_queue.push_back(lost);
        self.lanes[worker.0].busy = false;

        // The failed lane's thread already exited; reap it.
        if let Some(handle) = self.lanes[worker.0].handle.take() {
            handle.join();
        }

        if self.work_remains() {
            let handle = worker::spawn_worker(
                worker,
                Arc::clone(&self.path),
                Arc::clone(&self.oracle),
                self.event_tx.clone(),
            )
            .map_err(CountError::Spawn)?;
            self.lanes[worker.0].handle = Some(handle);
            self.workers_replaced += 1;
            eprintln!("worker {} replaced (stats preserved)", worker);
            self.dispatch(worker)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Pick the next task for an idle lane and send it, or send `Exit` when
    /// nothing remains.
    fn dispatch(&mut self, worker: WorkerId) -> Result<(), CountError> {
        debug_assert!(!self.lanes[worker.0].busy, "dispatch to a busy lane");

        let next = if let Some(task) = self.failed_queue.pop_front() {
            Some(task)
        } else if !self.task_queue.is_empty() {
            let slow = self.stats.class_of(worker) == PerfClass::Slow;
            if slow && self.task_queue.len() >= 2 {
                // Give a lagging lane the smallest unit available.
                self.task_queue.sort_unstable_by_key(|t| t.len());
                Some(self.task_queue.remove(0))
            } else {
                self.task_queue.pop()
            }
        } else if let Some((rem_start, rem_end)) = self.rem_range {
            let class = self.stats.class_of(worker);
            let task = self.minter.create_adaptive_task(rem_start, rem_end, class);
            self.rem_range = if task.end < rem_end {
                Some((task.end, rem_end))
            } else {
                None
            };
            Some(task)
        } else {
            None
        };

        let lane = &mut self.lanes[worker.0];
        let handle = lane.handle.as_ref().ok_or(CountError::WorkerLost(worker))?;
        match next {
            Some(task) => {
                self.stats.set_current(worker, task);
                lane.busy = true;
                handle
                    .dispatch(task)
                    .map_err(|_| CountError::WorkerLost(worker))
            }
            None => {
                handle.exit();
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Shutdown & report
    // ------------------------------------------------------------------

    fn shutdown(&mut self) {
        // `join` disconnects each command channel, which doubles as the exit
        // signal for lanes that never went through an idle dispatch.
        for lane in &mut self.lanes {
            if let Some(handle) = lane.handle.take() {
                handle.join();
            }
        }
    }

    fn report(&self) -> RunReport {
        let workers = self
            .stats
            .iter()
            .map(|(id, row)| WorkerSummary {
                worker: id,
                tasks_completed: row.tasks_completed,
                primes_found: row.primes_found,
                avg_processing_ms: row.avg_processing_ms,
                class: self.stats.class_of(id),
            })
            .collect();

        RunReport {
            prime_count: self.prime_count,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            file_size: self.file_size,
            bytes_processed: self.bytes_processed,
            tasks_completed: self.tasks_completed,
            workers_replaced: self.workers_replaced,
            global_avg_ms: self.stats.global_avg_ms(),
            workers,
        }
    }
}
