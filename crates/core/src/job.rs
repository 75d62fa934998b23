//! Per-run job configuration snapshot.
//!
//! A [`JobConfig`] is read from the job record store once, before the
//! analysis process is spawned, and never changes for the lifetime of the
//! run. The alignment source is resolved into a single [`Alignment`]
//! variant at snapshot time so the rest of the engine cannot observe an
//! ambiguous configuration.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// How the multiple sequence alignment for the run is obtained.
///
/// A job either names an alignment program for the tool to run, or points
/// at a precomputed alignment file. The enum makes the two mutually
/// exclusive; [`Alignment::resolve`] decides which one wins when the
/// stored record carries both raw fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    /// Name of the alignment program the analysis tool should invoke
    /// (e.g. `MAFFT`).
    Program(String),
    /// Reference to an uploaded, precomputed alignment file.
    Precomputed(DbId),
}

impl Alignment {
    /// Resolve the alignment source from the raw record fields.
    ///
    /// A precomputed alignment takes precedence over an alignment
    /// program; with neither set the tool picks its own default and no
    /// alignment argument is emitted.
    pub fn resolve(program: Option<String>, precomputed: Option<DbId>) -> Option<Self> {
        match (precomputed, program) {
            (Some(id), _) => Some(Self::Precomputed(id)),
            (None, Some(p)) if !p.is_empty() => Some(Self::Program(p)),
            _ => None,
        }
    }
}

/// Reference to an uploaded structure file together with the chain to
/// analyse. Both are required for the structure arguments to be emitted,
/// so the pair is modelled as one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRef {
    pub file: DbId,
    pub chain: String,
}

impl StructureRef {
    /// Combine the raw record fields; either one missing means no
    /// structure arguments at all.
    pub fn resolve(file: Option<DbId>, chain: Option<String>) -> Option<Self> {
        match (file, chain) {
            (Some(file), Some(chain)) if !chain.is_empty() => Some(Self { file, chain }),
            _ => None,
        }
    }
}

/// Immutable-for-the-run snapshot of an analysis job's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub id: DbId,
    pub title: String,
    pub query_sequence: String,
    /// Homolog search algorithm passed straight through to the tool.
    pub algorithm: String,
    pub alignment: Option<Alignment>,
    /// Protein FASTA database to search against.
    pub fasta_database: DbId,
    pub max_homologs: i32,
    pub max_iterations: i32,
    pub max_id: f64,
    pub min_id: f64,
    pub cutoff: f64,
    pub substitution_model: String,
    /// Restrict the search to the closest match only.
    pub closest: bool,
    /// Use maximum-likelihood rate inference.
    pub maximum_likelihood: bool,
    pub structure: Option<StructureRef>,
    pub query_name: Option<String>,
}
