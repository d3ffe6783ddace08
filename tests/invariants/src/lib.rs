//! TRv1 Property-Based Invariant Tests
//!
//! Uses proptest to verify hashgraph consensus invariants over randomly
//! generated gossip schedules:
//! - Determinism under reordering and across restarts
//! - Total order and timestamp monotonicity
//! - Monotone generation thresholds

pub mod consensus_invariants;
