//! Task minting and adaptive sizing.
//!
//! The task manager owns three things:
//!
//! - the id counter (every task of a run, initial or adaptive, is minted
//!   here, so ids are unique by construction),
//! - the initial partition rule, which picks a chunk size from the file size
//!   and core count,
//! - the adaptive sizer, fed by a sliding window of the most recent task
//!   durations.
//!
//! The window is deliberately distinct from the all-time global average kept
//! by the stats board: sizing reacts to the recent regime, classification
//! compares workers over the whole run.
//!
//! Only the orchestrator lane mints tasks, so a plain counter suffices; a
//! variant that mints from worker threads would need an atomic here.

use std::collections::VecDeque;

use super::task::{Task, TaskId};
use super::worker_stats::PerfClass;

/// Smallest chunk the sizer will produce (the file tail may still be smaller).
pub const MIN_CHUNK: u64 = 1024 * 1024;

/// Largest chunk the sizer will produce.
pub const MAX_CHUNK: u64 = 10 * 1024 * 1024;

/// Number of recent task durations the adaptive sizer looks at.
pub const HISTORY_WINDOW: usize = 20;

/// Floor for initial chunks of tiny files.
const TINY_FLOOR: u64 = 1024;

#[inline]
fn ceil_div(a: u64, b: u64) -> u64 {
    debug_assert!(b > 0);
    a.div_ceil(b)
}

/// Mints tasks and computes chunk sizes.
#[derive(Debug)]
pub struct TaskManager {
    next_id: u64,
    /// FIFO window of the most recent task durations (ms).
    history: VecDeque<u64>,
    /// Cached mean of `history`; `None` until the first sample.
    recent_avg_ms: Option<f64>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            history: VecDeque::with_capacity(HISTORY_WINDOW),
            recent_avg_ms: None,
        }
    }

    fn mint(&mut self, start: u64, end: u64) -> Task {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        Task::new(id, start, end)
    }

    /// Number of tasks minted so far.
    pub fn minted(&self) -> u64 {
        self.next_id
    }

    // ------------------------------------------------------------------
    // Initial partition
    // ------------------------------------------------------------------

    /// Chunk size for the initial partition.
    ///
    /// Three bands, all aiming at several tasks per worker so the adaptive
    /// machinery has something to rebalance:
    ///
    /// - tiny files: `2 × workers` tasks, floored at 1024 bytes
    /// - medium files: `4 × workers` tasks, unclamped
    /// - large files: `4 × workers` tasks clamped to `[MIN_CHUNK, MAX_CHUNK]`
    fn initial_chunk_size(file_size: u64, workers: u64) -> u64 {
        debug_assert!(workers > 0);
        let half_pool = workers.saturating_mul(2);
        let full_pool = workers.saturating_mul(4);
        if file_size < MIN_CHUNK.saturating_mul(half_pool) {
            ceil_div(file_size, half_pool).max(TINY_FLOOR)
        } else if file_size < MAX_CHUNK.saturating_mul(full_pool) {
            ceil_div(file_size, full_pool)
        } else {
            ceil_div(file_size, full_pool).clamp(MIN_CHUNK, MAX_CHUNK)
        }
    }

    /// Partition `[0, file_size)` into contiguous tasks, last one truncated.
    ///
    /// An empty file yields no tasks.
    pub fn initial_partition(&mut self, file_size: u64, workers: usize) -> Vec<Task> {
        if file_size == 0 {
            return Vec::new();
        }
        let chunk = Self::initial_chunk_size(file_size, workers.max(1) as u64);
        let mut tasks = Vec::with_capacity(ceil_div(file_size, chunk) as usize);
        let mut offset = 0u64;
        while offset < file_size {
            let end = offset.saturating_add(chunk).min(file_size);
            tasks.push(self.mint(offset, end));
            offset = end;
        }
        tasks
    }

    // ------------------------------------------------------------------
    // Adaptive sizing
    // ------------------------------------------------------------------

    /// Record one completed task duration into the sliding window.
    pub fn record(&mut self, duration_ms: u64) {
        if self.history.len() == HISTORY_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(duration_ms);
        let sum: u64 = self.history.iter().sum();
        self.recent_avg_ms = Some(sum as f64 / self.history.len() as f64);
    }

    /// Mean of the duration window, if any task has completed.
    pub fn recent_avg_ms(&self) -> Option<f64> {
        self.recent_avg_ms
    }

    /// Base adaptive chunk size from the recent average duration.
    ///
    /// Slower recent tasks mean denser lines or slower lanes; shrinking the
    /// chunk keeps per-task latency (and the cost of a retry) bounded.
    ///
    /// | recent avg (ms) | chunk |
    /// |-----------------|-------|
    /// | > 1000          | `MIN_CHUNK` |
    /// | (500, 1000]     | `(MIN_CHUNK + MAX_CHUNK) / 4` |
    /// | (200, 500]      | `(MIN_CHUNK + MAX_CHUNK) / 2` |
    /// | <= 200 or none  | `MAX_CHUNK` |
    pub fn adaptive_size(&self) -> u64 {
        match self.recent_avg_ms {
            Some(avg) if avg > 1000.0 => MIN_CHUNK,
            Some(avg) if avg > 500.0 => (MIN_CHUNK + MAX_CHUNK) / 4,
            Some(avg) if avg > 200.0 => (MIN_CHUNK + MAX_CHUNK) / 2,
            _ => MAX_CHUNK,
        }
    }

    /// Adaptive size adjusted for the target worker's class.
    ///
    /// Slow workers get half (floored at `MIN_CHUNK`), fast workers get 1.5×
    /// (capped at `MAX_CHUNK`), so the result always stays in
    /// `[MIN_CHUNK, MAX_CHUNK]`.
    pub fn adjusted_size(&self, class: PerfClass) -> u64 {
        let base = self.adaptive_size();
        match class {
            PerfClass::Slow => (base / 2).max(MIN_CHUNK),
            PerfClass::Fast => (base + base / 2).min(MAX_CHUNK),
            PerfClass::Average => base,
        }
    }

    /// Mint a task at the head of the remaining range `[rem_start, rem_end)`,
    /// sized for `class` and truncated to the range.
    ///
    /// # Panics
    ///
    /// Debug-asserts the range is non-empty; callers clear the remaining
    /// range before it drains to zero.
    pub fn create_adaptive_task(&mut self, rem_start: u64, rem_end: u64, class: PerfClass) -> Task {
        debug_assert!(rem_start < rem_end, "adaptive mint from empty range");
        let size = self.adjusted_size(class).min(rem_end - rem_start);
        self.mint(rem_start, rem_start + size)
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_file_uses_floor() {
        // 16 bytes, 4 workers: 16 < MIN_CHUNK * 8, ceil(16 / 8) = 2, floored
        // to 1024, so a single task covers the file.
        let mut tm = TaskManager::new();
        let tasks = tm.initial_partition(16, 4);
        assert_eq!(tasks.len(), 1);
        assert_eq!((tasks[0].start, tasks[0].end), (0, 16));
    }

    #[test]
    fn medium_file_targets_four_tasks_per_worker() {
        let mut tm = TaskManager::new();
        let file_size = 64 * 1024 * 1024; // inside the middle band for 4 workers
        let tasks = tm.initial_partition(file_size, 4);
        assert_eq!(tasks.len(), 16);
        assert_eq!(tasks[0].len(), 4 * 1024 * 1024);
    }

    #[test]
    fn large_file_clamps_to_max_chunk() {
        let mut tm = TaskManager::new();
        let file_size = MAX_CHUNK * 4 * 100; // well past the large-file band
        let tasks = tm.initial_partition(file_size, 4);
        assert!(tasks.iter().all(|t| t.len() <= MAX_CHUNK));
        assert_eq!(tasks[0].len(), MAX_CHUNK);
    }

    #[test]
    fn partition_covers_exactly_without_overlap() {
        let mut tm = TaskManager::new();
        for &file_size in &[1u64, 1023, 1024, 1025, 5 * 1024 * 1024 + 17, 200 * 1024 * 1024] {
            let tasks = tm.initial_partition(file_size, 3);
            let mut expect = 0u64;
            for t in &tasks {
                assert_eq!(t.start, expect, "gap or overlap at {}", t.start);
                expect = t.end;
            }
            assert_eq!(expect, file_size);
        }
    }

    #[test]
    fn empty_file_has_no_tasks() {
        let mut tm = TaskManager::new();
        assert!(tm.initial_partition(0, 8).is_empty());
    }

    #[test]
    fn ids_are_unique_across_partition_and_adaptive() {
        let mut tm = TaskManager::new();
        let mut ids: Vec<TaskId> = tm
            .initial_partition(100 * 1024 * 1024, 4)
            .iter()
            .map(|t| t.id)
            .collect();
        for i in 0..50u64 {
            let t = tm.create_adaptive_task(i * MAX_CHUNK, u64::MAX, PerfClass::Average);
            ids.push(t.id);
        }
        let before = ids.len();
        assert_eq!(tm.minted(), before as u64);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn adaptive_size_bands() {
        let mut tm = TaskManager::new();
        assert_eq!(tm.adaptive_size(), MAX_CHUNK); // no data yet

        tm.record(100);
        assert_eq!(tm.adaptive_size(), MAX_CHUNK);

        let mut tm = TaskManager::new();
        tm.record(350);
        assert_eq!(tm.adaptive_size(), (MIN_CHUNK + MAX_CHUNK) / 2);

        let mut tm = TaskManager::new();
        tm.record(750);
        assert_eq!(tm.adaptive_size(), (MIN_CHUNK + MAX_CHUNK) / 4);

        let mut tm = TaskManager::new();
        tm.record(1500);
        assert_eq!(tm.adaptive_size(), MIN_CHUNK);
    }

    #[test]
    fn band_edges() {
        for &(ms, expect) in &[
            (200u64, MAX_CHUNK),
            (201, (MIN_CHUNK + MAX_CHUNK) / 2),
            (500, (MIN_CHUNK + MAX_CHUNK) / 2),
            (501, (MIN_CHUNK + MAX_CHUNK) / 4),
            (1000, (MIN_CHUNK + MAX_CHUNK) / 4),
            (1001, MIN_CHUNK),
        ] {
            let mut tm = TaskManager::new();
            tm.record(ms);
            assert_eq!(tm.adaptive_size(), expect, "at {} ms", ms);
        }
    }

    #[test]
    fn class_adjustment_stays_in_bounds() {
        let mut tm = TaskManager::new();
        tm.record(1500); // base = MIN_CHUNK
        assert_eq!(tm.adjusted_size(PerfClass::Slow), MIN_CHUNK); // floored
        assert_eq!(tm.adjusted_size(PerfClass::Average), MIN_CHUNK);
        assert_eq!(tm.adjusted_size(PerfClass::Fast), MIN_CHUNK + MIN_CHUNK / 2);

        let tm = TaskManager::new(); // base = MAX_CHUNK
        assert_eq!(tm.adjusted_size(PerfClass::Fast), MAX_CHUNK); // capped
        assert_eq!(tm.adjusted_size(PerfClass::Slow), MAX_CHUNK / 2);
    }

    #[test]
    fn window_drops_oldest() {
        let mut tm = TaskManager::new();
        // Fill the window with slow samples, then push it full of fast ones:
        // the slow samples must age out entirely.
        for _ in 0..HISTORY_WINDOW {
            tm.record(2000);
        }
        assert_eq!(tm.adaptive_size(), MIN_CHUNK);
        for _ in 0..HISTORY_WINDOW {
            tm.record(10);
        }
        assert_eq!(tm.recent_avg_ms(), Some(10.0));
        assert_eq!(tm.adaptive_size(), MAX_CHUNK);
    }

    #[test]
    fn adaptive_task_truncates_to_remaining_range() {
        let mut tm = TaskManager::new();
        let t = tm.create_adaptive_task(1000, 1000 + 100, PerfClass::Average);
        assert_eq!((t.start, t.end), (1000, 1100));

        let t = tm.create_adaptive_task(0, u64::MAX, PerfClass::Average);
        assert_eq!(t.len(), MAX_CHUNK);
    }
}
