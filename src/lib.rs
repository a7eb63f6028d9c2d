//! ft -- record per-test outcomes across runs and classify failures as
//! genuinely broken or flaky.
//!
//! The pipeline is: ingest outcomes from a source, resolve a stable key
//! per test, combine each outcome with that key's persisted history to
//! decide PASSED / FLAKY / FAILED, append the result to the history, and
//! derive a per-test summary (stability, trend, last passed) for a
//! report renderer to consume.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod history;
pub mod identity;
pub mod ingest;
pub mod outcome;
