//! Job execution engine.
//!
//! Contains the bounded dispatch queue that hands job-run requests to
//! execution contexts, and the per-job runner that drives the external
//! analysis process, feeds the progress accumulator, and publishes
//! updates to the session group.

pub mod queue;
pub mod runner;

pub use queue::JobQueue;
pub use runner::RunnerContext;
