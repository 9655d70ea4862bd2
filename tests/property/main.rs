//! Property-based and exhaustive soundness tests.
//!
//! Run with: `cargo test --test property`

mod line_boundaries;
mod partitioning;
mod primality;
