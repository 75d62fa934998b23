//! Filesystem path resolution backed by the reference-file tables.
//!
//! Uploaded files store their paths relative to the media root; job
//! working directories live under `<media_root>/analysis_jobs/<id>`.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::PgPool;

use conseq_core::error::StoreError;
use conseq_core::store::{FileStore, OUTPUT_ARTIFACT_NAME, QUERY_FILE_NAME};
use conseq_core::types::DbId;

use crate::models::reference::{FastaDatabase, MsaFile, StructureFile};

/// Directory under the media root that holds per-job working
/// directories.
const JOBS_DIR: &str = "analysis_jobs";

/// [`FileStore`] implementation over the media root and the
/// reference-file tables.
pub struct MediaStore {
    pool: PgPool,
    media_root: PathBuf,
}

impl MediaStore {
    pub fn new(pool: PgPool, media_root: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            media_root: media_root.into(),
        }
    }

    fn job_dir(&self, job_id: DbId) -> PathBuf {
        self.media_root.join(JOBS_DIR).join(job_id.to_string())
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        self.media_root.join(relative)
    }
}

#[async_trait]
impl FileStore for MediaStore {
    async fn prepare_job_dir(&self, job_id: DbId) -> Result<PathBuf, StoreError> {
        let dir = self.job_dir(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn write_query_file(
        &self,
        job_id: DbId,
        sequence: &str,
    ) -> Result<PathBuf, StoreError> {
        let path = self.job_dir(job_id).join(QUERY_FILE_NAME);
        tokio::fs::write(&path, sequence).await?;
        Ok(path)
    }

    fn output_artifact(&self, job_id: DbId) -> PathBuf {
        self.job_dir(job_id).join(OUTPUT_ARTIFACT_NAME)
    }

    async fn database_path(&self, database_id: DbId) -> Result<PathBuf, StoreError> {
        let row: Option<FastaDatabase> = sqlx::query_as(
            "SELECT id, name, file_path, uploaded_at FROM fasta_databases WHERE id = $1",
        )
        .bind(database_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let db = row.ok_or(StoreError::NotFound {
            entity: "FASTA database",
            id: database_id,
        })?;
        Ok(self.resolve(&db.file_path))
    }

    async fn alignment_path(&self, msa_id: DbId) -> Result<PathBuf, StoreError> {
        let row: Option<MsaFile> = sqlx::query_as(
            "SELECT id, name, file_path, uploaded_at FROM msa_files WHERE id = $1",
        )
        .bind(msa_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let msa = row.ok_or(StoreError::NotFound {
            entity: "alignment file",
            id: msa_id,
        })?;
        Ok(self.resolve(&msa.file_path))
    }

    async fn structure_path(&self, structure_id: DbId) -> Result<PathBuf, StoreError> {
        let row: Option<StructureFile> = sqlx::query_as(
            "SELECT id, name, file_path, uploaded_at FROM structure_files WHERE id = $1",
        )
        .bind(structure_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let structure = row.ok_or(StoreError::NotFound {
            entity: "structure file",
            id: structure_id,
        })?;
        Ok(self.resolve(&structure.file_path))
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}
