//! Core domain logic for the conseq analysis platform.
//!
//! This crate holds everything the job engine needs that is independent
//! of the web layer and the database:
//!
//! - [`status::JobStatus`] — the typed job lifecycle state machine.
//! - [`job::JobConfig`] — the immutable per-run configuration snapshot.
//! - [`command`] — deterministic argument construction for the external
//!   analysis tool.
//! - [`supervisor`] — process spawning and multiplexed output streaming.
//! - [`progress`] — output accumulation, persistence batching, and the
//!   [`progress::ProgressEvent`] broadcast payload.
//! - [`store`] — the narrow collaborator traits for the job record store
//!   and the file store.
//!
//! No internal dependencies: `conseq-db` and `conseq-api` depend on this
//! crate, never the other way around.

pub mod command;
pub mod error;
pub mod job;
pub mod progress;
pub mod status;
pub mod store;
pub mod supervisor;
pub mod types;
