//! TRv1 Benchmark Suite
//!
//! This crate contains performance benchmarks for the hashgraph consensus
//! engine.
//!
//! Run all benchmarks:
//! ```bash
//! cargo bench -p trv1-bench
//! ```
//!
//! Run a specific benchmark group:
//! ```bash
//! cargo bench -p trv1-bench --bench consensus_bench -- consensus/add_event
//! ```

pub mod helpers;
