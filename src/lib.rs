//! Parallel prime counter for line-oriented integer files.
//!
//! Counts the prime integers in a text file holding one decimal integer per
//! line, built for files too large to buffer and machines with spare cores.
//! The interesting part is not the primality test but the work distribution:
//! the file is cut into byte-range tasks, workers are classified from live
//! throughput, chunk sizes adapt to recent task durations, and a worker death
//! requeues its range without losing or double-counting a line.
//!
//! High-level flow:
//! Path -> initial partition -> worker pool -> range reader -> oracle
//!      -> per-worker stats -> adaptive resize / class-aware dispatch.
//!
//! ```no_run
//! use primecount_rs::{count_primes, RunConfig};
//!
//! let report = count_primes("input.txt".as_ref(), &RunConfig::default())?;
//! println!("{} primes", report.prime_count);
//! # Ok::<(), primecount_rs::CountError>(())
//! ```

pub mod primality;
pub mod range_reader;
pub mod scheduler;

pub use primality::is_prime;
pub use range_reader::IntegerLines;
pub use scheduler::{
    count_primes, count_primes_with_oracle, CountError, PerfClass, RunConfig, RunReport,
};
