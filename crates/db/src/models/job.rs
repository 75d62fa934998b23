//! Analysis job row model and its configuration snapshot.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use conseq_core::job::{Alignment, JobConfig, StructureRef};
use conseq_core::types::{DbId, Timestamp};

/// A row from the `analysis_jobs` table.
///
/// The engine reads the configuration columns once per run and writes
/// only `status`, `log_data`, `error_data`, and `process_cmd`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnalysisJob {
    pub id: DbId,
    pub title: String,
    pub query_sequence: String,
    pub algorithm: String,
    pub alignment_program: Option<String>,
    pub msa_id: Option<DbId>,
    pub fasta_database_id: DbId,
    pub structure_id: Option<DbId>,
    pub chain: Option<String>,
    pub query_name: Option<String>,
    pub max_homologs: i32,
    pub max_iterations: i32,
    pub max_id: f64,
    pub min_id: f64,
    pub cutoff: f64,
    pub substitution_model: String,
    pub closest: bool,
    pub maximum_likelihood: bool,
    pub status: String,
    pub log_data: Option<String>,
    pub error_data: Option<String>,
    pub process_cmd: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AnalysisJob {
    /// The immutable configuration snapshot for a run.
    ///
    /// Resolves the raw alignment columns into a single source
    /// (precomputed wins) and pairs the structure reference with its
    /// chain.
    pub fn config(&self) -> JobConfig {
        JobConfig {
            id: self.id,
            title: self.title.clone(),
            query_sequence: self.query_sequence.clone(),
            algorithm: self.algorithm.clone(),
            alignment: Alignment::resolve(self.alignment_program.clone(), self.msa_id),
            fasta_database: self.fasta_database_id,
            max_homologs: self.max_homologs,
            max_iterations: self.max_iterations,
            max_id: self.max_id,
            min_id: self.min_id,
            cutoff: self.cutoff,
            substitution_model: self.substitution_model.clone(),
            closest: self.closest,
            maximum_likelihood: self.maximum_likelihood,
            structure: StructureRef::resolve(self.structure_id, self.chain.clone()),
            query_name: self.query_name.clone(),
        }
    }
}

/// DTO for creating a new pending job row.
#[derive(Debug, Deserialize)]
pub struct NewAnalysisJob {
    pub title: String,
    pub query_sequence: String,
    pub algorithm: String,
    pub alignment_program: Option<String>,
    pub msa_id: Option<DbId>,
    pub fasta_database_id: DbId,
    pub structure_id: Option<DbId>,
    pub chain: Option<String>,
    pub query_name: Option<String>,
    pub max_homologs: i32,
    pub max_iterations: i32,
    pub max_id: f64,
    pub min_id: f64,
    pub cutoff: f64,
    pub substitution_model: String,
    pub closest: bool,
    pub maximum_likelihood: bool,
}
