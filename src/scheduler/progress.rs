//! Progress and final-report emission.
//!
//! Progress goes to stdout at most once per second: overall percent, resident
//! memory, per-lane counters with the in-flight task, the all-time global
//! average, and an ETA extrapolated from bytes covered so far. The final
//! block repeats the per-lane summary with the run totals.
//!
//! Reporting never touches worker threads; it reads the orchestrator's own
//! state between events, so a quiet run costs exactly one branch per result.

use std::time::{Duration, Instant};

use super::orchestrator::RunReport;
use super::rusage::{format_bytes, resident_memory_bytes};
use super::worker_stats::StatsBoard;

/// Minimum delay between two progress emissions.
const EMIT_INTERVAL: Duration = Duration::from_millis(1000);

/// Fraction of the file covered by completed tasks, in `[0, 1]`.
fn completion_fraction(bytes_processed: u64, file_size: u64) -> f64 {
    if file_size == 0 {
        1.0
    } else {
        bytes_processed as f64 / file_size as f64
    }
}

/// Remaining time estimate: `elapsed * (1 - p) / p`.
///
/// `None` until any bytes complete (no basis to extrapolate).
fn eta(elapsed: Duration, p: f64) -> Option<Duration> {
    if p <= 0.0 {
        None
    } else if p >= 1.0 {
        Some(Duration::ZERO)
    } else {
        Some(elapsed.mul_f64((1.0 - p) / p))
    }
}

/// Throttled progress printer owned by the orchestrator lane.
pub(crate) struct ProgressReporter {
    enabled: bool,
    last_emit: Option<Instant>,
}

impl ProgressReporter {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_emit: None,
        }
    }

    /// Emit a progress block unless one was emitted less than a second ago.
    pub(crate) fn maybe_emit(
        &mut self,
        stats: &StatsBoard,
        bytes_processed: u64,
        file_size: u64,
        started: Instant,
    ) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < EMIT_INTERVAL {
                return;
            }
        }
        self.last_emit = Some(now);

        let p = completion_fraction(bytes_processed, file_size);
        let elapsed = started.elapsed();

        let eta_s = match eta(elapsed, p) {
            Some(d) => format!("{:.1}s", d.as_secs_f64()),
            None => "-".to_string(),
        };
        println!(
            "[{:5.1}%] {}/{} | rss {} | tasks {} | global avg {:.1}ms | eta {}",
            p * 100.0,
            format_bytes(bytes_processed),
            format_bytes(file_size),
            format_bytes(resident_memory_bytes()),
            stats.total_tasks_completed(),
            stats.global_avg_ms(),
            eta_s,
        );
        for (id, row) in stats.iter() {
            let current = match row.current {
                Some(task) => format!("{}({})", task.id, format_bytes(task.len())),
                None => "idle".to_string(),
            };
            println!(
                "  {} tasks={} primes={} avg={:.1}ms class={} current={}",
                id,
                row.tasks_completed,
                row.primes_found,
                row.avg_processing_ms,
                stats.class_of(id),
                current,
            );
        }
    }
}

/// Print the end-of-run block: totals plus one line per worker lane.
pub fn print_final_report(report: &RunReport) {
    println!("total primes: {}", report.prime_count);
    println!("elapsed: {} ms", report.elapsed_ms);
    println!(
        "tasks completed: {} ({} worker replacement{})",
        report.tasks_completed,
        report.workers_replaced,
        if report.workers_replaced == 1 { "" } else { "s" },
    );
    println!("global avg task: {:.1} ms", report.global_avg_ms);
    for w in &report.workers {
        println!(
            "  {} tasks={} primes={} avg={:.1}ms class={}",
            w.worker, w.tasks_completed, w.primes_found, w.avg_processing_ms, w.class,
        );
    }
}
