//! Per-worker statistics and performance classification.
//!
//! The stats board lives on the orchestrator lane and is mutated only there,
//! so updates are trivially atomic with respect to classification reads: the
//! class used to pick a worker's next task always reflects every result
//! folded so far. No locks, no atomics.
//!
//! Rows are created once per lane and never destroyed; a replacement worker
//! inherits its predecessor's row, so a lane's history survives failures.

use std::fmt;

use super::task::{Task, TaskResult, WorkerId};

/// Results to fold globally before classification starts deviating from
/// `Average`. Below this the global average is too noisy to trust.
const WARMUP_TASKS: u64 = 3;

/// A worker at least this much slower than the global average is `Slow`.
const SLOW_RATIO: f64 = 1.2;

/// A worker at least this much faster than the global average is `Fast`.
const FAST_RATIO: f64 = 0.8;

/// Relative speed of a worker lane, derived at dispatch time.
///
/// Never cached on the worker: the classification is recomputed from the
/// current averages each time it is needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerfClass {
    Slow,
    Average,
    Fast,
}

impl fmt::Display for PerfClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PerfClass::Slow => "slow",
            PerfClass::Average => "average",
            PerfClass::Fast => "fast",
        };
        f.write_str(s)
    }
}

/// Counters for one worker lane.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkerStats {
    pub tasks_completed: u64,
    pub total_processing_ms: u64,
    pub primes_found: u64,
    /// `total_processing_ms / tasks_completed`; 0 until the first result.
    pub avg_processing_ms: f64,
    /// In-flight task, tracked for failure recovery.
    pub current: Option<Task>,
}

/// All per-worker rows plus the run-wide aggregates they feed.
#[derive(Debug)]
pub struct StatsBoard {
    workers: Vec<WorkerStats>,
    /// All-time mean task duration, weighted by task (not by worker).
    global_avg_ms: f64,
    total_tasks_completed: u64,
}

impl StatsBoard {
    /// One zeroed row per worker lane.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: vec![WorkerStats::default(); workers],
            global_avg_ms: 0.0,
            total_tasks_completed: 0,
        }
    }

    pub fn lanes(&self) -> usize {
        self.workers.len()
    }

    pub fn worker(&self, id: WorkerId) -> &WorkerStats {
        &self.workers[id.0]
    }

    /// Iterate rows in lane order, for reporting.
    pub fn iter(&self) -> impl Iterator<Item = (WorkerId, &WorkerStats)> {
        self.workers
            .iter()
            .enumerate()
            .map(|(i, w)| (WorkerId(i), w))
    }

    // ------------------------------------------------------------------
    // In-flight tracking
    // ------------------------------------------------------------------

    pub fn set_current(&mut self, id: WorkerId, task: Task) {
        let slot = &mut self.workers[id.0].current;
        debug_assert!(slot.is_none(), "{} already has an in-flight task", id);
        *slot = Some(task);
    }

    /// Clear and return the in-flight task, if any. The failure path uses the
    /// returned task to requeue work lost with a dead worker.
    pub fn take_current(&mut self, id: WorkerId) -> Option<Task> {
        self.workers[id.0].current.take()
    }

    pub fn current(&self, id: WorkerId) -> Option<Task> {
        self.workers[id.0].current
    }

    // ------------------------------------------------------------------
    // Folding results
    // ------------------------------------------------------------------

    /// Fold one completed result into the worker's row and the global
    /// average, and clear the lane's in-flight slot.
    pub fn record_result(&mut self, result: &TaskResult) {
        let row = &mut self.workers[result.worker.0];
        debug_assert_eq!(
            row.current.map(|t| t.id),
            Some(result.task.id),
            "result for a task the lane does not own"
        );

        row.tasks_completed += 1;
        row.total_processing_ms += result.elapsed_ms;
        row.primes_found += result.prime_count;
        row.avg_processing_ms = row.total_processing_ms as f64 / row.tasks_completed as f64;

        // Incremental all-time mean, weighted per task.
        let n = self.total_tasks_completed as f64;
        self.global_avg_ms = (self.global_avg_ms * n + result.elapsed_ms as f64) / (n + 1.0);
        self.total_tasks_completed += 1;

        self.workers[result.worker.0].current = None;
    }

    pub fn global_avg_ms(&self) -> f64 {
        self.global_avg_ms
    }

    pub fn total_tasks_completed(&self) -> u64 {
        self.total_tasks_completed
    }

    /// Total primes across all lanes.
    pub fn primes_found(&self) -> u64 {
        self.workers.iter().map(|w| w.primes_found).sum()
    }

    // ------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------

    /// Classify a lane against the global average.
    ///
    /// Returns `Average` during warm-up (fewer than `WARMUP_TASKS` results
    /// globally, or none for this lane, or a degenerate zero global average),
    /// otherwise bands on `lane_avg / global_avg`.
    pub fn class_of(&self, id: WorkerId) -> PerfClass {
        let row = &self.workers[id.0];
        if self.total_tasks_completed < WARMUP_TASKS || row.tasks_completed == 0 {
            return PerfClass::Average;
        }
        if self.global_avg_ms <= 0.0 {
            // All observed tasks took < 1 ms; nothing meaningful to compare.
            return PerfClass::Average;
        }
        let ratio = row.avg_processing_ms / self.global_avg_ms;
        if ratio > SLOW_RATIO {
            PerfClass::Slow
        } else if ratio < FAST_RATIO {
            PerfClass::Fast
        } else {
            PerfClass::Average
        }
    }
}
