//! Error types for the counting run.
//!
//! Transient per-task failures (I/O mid-range, worker panics) are not errors
//! at this level: the orchestrator requeues the task and replaces the worker.
//! What surfaces here is the unrecoverable remainder: a file that cannot be
//! opened at startup, a thread that cannot be spawned, or a retry budget
//! exhausted. I/O sources are preserved for diagnostics.

use std::fmt;
use std::io;
use std::path::PathBuf;

use super::task::{TaskId, WorkerId};

/// Fatal errors from a counting run.
#[derive(Debug)]
#[non_exhaustive]
pub enum CountError {
    /// The input file could not be stat'd or opened at startup.
    Input { path: PathBuf, source: io::Error },
    /// A worker thread could not be spawned.
    Spawn(io::Error),
    /// A task failed more often than `max_task_attempts` allows.
    AttemptsExhausted { task: TaskId, attempts: u32 },
    /// A worker lane stopped accepting work without reporting failure.
    /// Indicates a logic violation; should never occur.
    WorkerLost(WorkerId),
}

impl CountError {
    pub fn input(path: &std::path::Path, source: io::Error) -> Self {
        Self::Input {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for CountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input { path, source } => {
                write!(f, "cannot read input file {}: {}", path.display(), source)
            }
            Self::Spawn(source) => write!(f, "cannot spawn worker thread: {}", source),
            Self::AttemptsExhausted { task, attempts } => {
                write!(f, "task {} failed {} times, giving up", task, attempts)
            }
            Self::WorkerLost(worker) => {
                write!(f, "worker {} vanished without reporting", worker)
            }
        }
    }
}

impl std::error::Error for CountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Input { source, .. } | Self::Spawn(source) => Some(source),
            _ => None,
        }
    }
}
