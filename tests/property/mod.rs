//! Property-based tests for the permit arbitration system's invariants.

pub mod pacer;
