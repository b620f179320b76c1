//! Deterministic, pure session logic.
//!
//! Core modules must be free of I/O side effects and logging. They operate on
//! in-memory values and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod issues;
pub mod jurisdictions;
pub mod mismatch;
pub mod records;
pub mod session;
pub mod summarizer;
pub mod types;
