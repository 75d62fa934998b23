//! Uploaded reference file rows (FASTA databases, precomputed
//! alignments, structure files). Paths are stored relative to the media
//! root.

use serde::Serialize;
use sqlx::FromRow;

use conseq_core::types::{DbId, Timestamp};

/// A row from the `fasta_databases` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FastaDatabase {
    pub id: DbId,
    pub name: String,
    pub file_path: String,
    pub uploaded_at: Timestamp,
}

/// A row from the `msa_files` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MsaFile {
    pub id: DbId,
    pub name: String,
    pub file_path: String,
    pub uploaded_at: Timestamp,
}

/// A row from the `structure_files` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StructureFile {
    pub id: DbId,
    pub name: String,
    pub file_path: String,
    pub uploaded_at: Timestamp,
}
