//! Repository for the `analysis_jobs` table.
//!
//! Status transitions always go through [`JobStatus`] — the status
//! column never sees a string that is not one of the enum's canonical
//! names.

use async_trait::async_trait;
use sqlx::PgPool;

use conseq_core::error::StoreError;
use conseq_core::job::JobConfig;
use conseq_core::status::JobStatus;
use conseq_core::store::JobStore;
use conseq_core::types::DbId;

use crate::models::job::{AnalysisJob, NewAnalysisJob};

/// Column list for `analysis_jobs` queries.
const COLUMNS: &str = "\
    id, title, query_sequence, algorithm, alignment_program, msa_id, \
    fasta_database_id, structure_id, chain, query_name, \
    max_homologs, max_iterations, max_id, min_id, cutoff, \
    substitution_model, closest, maximum_likelihood, \
    status, log_data, error_data, process_cmd, \
    created_at, updated_at";

/// Provides CRUD operations for analysis jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new pending job row.
    pub async fn submit(pool: &PgPool, input: &NewAnalysisJob) -> Result<AnalysisJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO analysis_jobs (\
                 title, query_sequence, algorithm, alignment_program, msa_id, \
                 fasta_database_id, structure_id, chain, query_name, \
                 max_homologs, max_iterations, max_id, min_id, cutoff, \
                 substitution_model, closest, maximum_likelihood, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisJob>(&query)
            .bind(&input.title)
            .bind(&input.query_sequence)
            .bind(&input.algorithm)
            .bind(&input.alignment_program)
            .bind(input.msa_id)
            .bind(input.fasta_database_id)
            .bind(input.structure_id)
            .bind(&input.chain)
            .bind(&input.query_name)
            .bind(input.max_homologs)
            .bind(input.max_iterations)
            .bind(input.max_id)
            .bind(input.min_id)
            .bind(input.cutoff)
            .bind(&input.substitution_model)
            .bind(input.closest)
            .bind(input.maximum_likelihood)
            .bind(JobStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    /// Fetch a job row by id.
    pub async fn fetch(pool: &PgPool, job_id: DbId) -> Result<Option<AnalysisJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM analysis_jobs WHERE id = $1");
        sqlx::query_as::<_, AnalysisJob>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// Persist a status transition.
    pub async fn set_status(
        pool: &PgPool,
        job_id: DbId,
        status: JobStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE analysis_jobs SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(job_id)
            .bind(status.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record the resolved command line before execution.
    pub async fn record_command(
        pool: &PgPool,
        job_id: DbId,
        command_line: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE analysis_jobs SET process_cmd = $2, updated_at = NOW() WHERE id = $1")
            .bind(job_id)
            .bind(command_line)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Persist full log/error snapshots.
    pub async fn save_progress(
        pool: &PgPool,
        job_id: DbId,
        log: &str,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE analysis_jobs SET log_data = $2, error_data = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(log)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// [`JobStore`] implementation over the Postgres pool.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn job_config(&self, job_id: DbId) -> Result<JobConfig, StoreError> {
        let job = JobRepo::fetch(&self.pool, job_id)
            .await
            .map_err(db_error)?
            .ok_or(StoreError::NotFound {
                entity: "analysis job",
                id: job_id,
            })?;
        Ok(job.config())
    }

    async fn set_status(&self, job_id: DbId, status: JobStatus) -> Result<(), StoreError> {
        JobRepo::set_status(&self.pool, job_id, status)
            .await
            .map_err(db_error)
    }

    async fn record_command(&self, job_id: DbId, command_line: &str) -> Result<(), StoreError> {
        JobRepo::record_command(&self.pool, job_id, command_line)
            .await
            .map_err(db_error)
    }

    async fn save_progress(&self, job_id: DbId, log: &str, error: &str) -> Result<(), StoreError> {
        JobRepo::save_progress(&self.pool, job_id, log, error)
            .await
            .map_err(db_error)
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}
