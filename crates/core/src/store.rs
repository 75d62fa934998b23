//! Collaborator traits for the job record store and the file store.
//!
//! The engine only ever touches these narrow interfaces; the production
//! implementations live in `conseq-db`, and tests substitute in-memory
//! fakes.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::job::JobConfig;
use crate::status::JobStatus;
use crate::types::DbId;

/// Fixed name of the query sequence file written into the job directory
/// before launch.
pub const QUERY_FILE_NAME: &str = "query.fasta";

/// Fixed name of the output archive whose presence marks a successful
/// run. The artifact check is authoritative over the exit code.
pub const OUTPUT_ARTIFACT_NAME: &str = "Consurf_Outputs.zip";

/// Read/write access to the externally owned job records.
///
/// The engine never queries for unrelated fields: it reads one
/// configuration snapshot and writes status, output snapshots, and the
/// recorded command line.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// The immutable configuration snapshot for a run.
    async fn job_config(&self, job_id: DbId) -> Result<JobConfig, StoreError>;

    /// Persist a status transition.
    async fn set_status(&self, job_id: DbId, status: JobStatus) -> Result<(), StoreError>;

    /// Record the fully resolved command line before execution begins.
    async fn record_command(&self, job_id: DbId, command_line: &str) -> Result<(), StoreError>;

    /// Persist full log/error snapshots (periodic and terminal saves).
    async fn save_progress(
        &self,
        job_id: DbId,
        log: &str,
        error: &str,
    ) -> Result<(), StoreError>;
}

/// Resolves job ids and uploaded-file references to filesystem paths.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Create (if needed) and return the job's dedicated working
    /// directory.
    async fn prepare_job_dir(&self, job_id: DbId) -> Result<PathBuf, StoreError>;

    /// Write the query sequence to [`QUERY_FILE_NAME`] inside the job
    /// directory and return its path.
    async fn write_query_file(&self, job_id: DbId, sequence: &str)
        -> Result<PathBuf, StoreError>;

    /// Where the output archive is expected after a successful run.
    fn output_artifact(&self, job_id: DbId) -> PathBuf;

    /// Absolute path of an uploaded protein FASTA database.
    async fn database_path(&self, database_id: DbId) -> Result<PathBuf, StoreError>;

    /// Absolute path of an uploaded precomputed alignment.
    async fn alignment_path(&self, msa_id: DbId) -> Result<PathBuf, StoreError>;

    /// Absolute path of an uploaded structure file.
    async fn structure_path(&self, structure_id: DbId) -> Result<PathBuf, StoreError>;
}
