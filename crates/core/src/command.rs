//! Deterministic argument construction for the external analysis tool.
//!
//! The tool is an opaque black box: the engine only knows its argument
//! contract and its success signal (exit code plus output artifact). The
//! fully resolved command line is recorded on the job record before
//! execution for auditability.

use std::path::{Path, PathBuf};

use crate::job::JobConfig;

/// Resolved alignment input for the command line, after file references
/// have been turned into absolute paths.
#[derive(Debug, Clone)]
pub enum AlignmentInput {
    /// `--align <program>`
    Program(String),
    /// `--msa <path>` — precomputed alignment file.
    Msa(PathBuf),
}

/// All filesystem inputs the command line needs, resolved by the file
/// store before the command is built.
#[derive(Debug, Clone)]
pub struct AnalysisInputs {
    /// The `query.fasta` written into the job directory.
    pub query_file: PathBuf,
    /// Dedicated working directory for this job's outputs.
    pub job_dir: PathBuf,
    /// Protein FASTA database to search against.
    pub database: PathBuf,
    pub alignment: Option<AlignmentInput>,
    /// Structure file path plus the chain to analyse.
    pub structure: Option<(PathBuf, String)>,
}

/// A fully resolved invocation of the analysis tool.
#[derive(Debug, Clone)]
pub struct AnalysisCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Working directory the process runs in (the tool's home directory,
    /// not the job directory — outputs go to `--dir`).
    pub current_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl AnalysisCommand {
    /// Build the ordered argument list from the job configuration.
    ///
    /// Required arguments are always present; the alignment argument is
    /// `--msa` or `--align` (never both), boolean flags are appended only
    /// when set, and the structure pair and query name are appended only
    /// when supplied.
    pub fn build(
        program: impl Into<PathBuf>,
        tool_home: impl Into<PathBuf>,
        config: &JobConfig,
        inputs: &AnalysisInputs,
    ) -> Self {
        let mut args = vec![
            "--seq".to_string(),
            path_arg(&inputs.query_file),
            "--dir".to_string(),
            path_arg(&inputs.job_dir),
            "--DB".to_string(),
            path_arg(&inputs.database),
            "--MAX_HOMOLOGS".to_string(),
            config.max_homologs.to_string(),
            "--iterations".to_string(),
            config.max_iterations.to_string(),
            "--model".to_string(),
            config.substitution_model.clone(),
            "--MAX_ID".to_string(),
            config.max_id.to_string(),
            "--MIN_ID".to_string(),
            config.min_id.to_string(),
            "--cutoff".to_string(),
            config.cutoff.to_string(),
            "--algorithm".to_string(),
            config.algorithm.clone(),
        ];

        if config.maximum_likelihood {
            args.push("--Maximum_Likelihood".to_string());
        }
        if config.closest {
            args.push("--closest".to_string());
        }

        match &inputs.alignment {
            Some(AlignmentInput::Msa(path)) => {
                args.push("--msa".to_string());
                args.push(path_arg(path));
            }
            Some(AlignmentInput::Program(program)) => {
                args.push("--align".to_string());
                args.push(program.clone());
            }
            None => {}
        }

        if let Some((path, chain)) = &inputs.structure {
            args.push("--structure".to_string());
            args.push(path_arg(path));
            args.push("--chain".to_string());
            args.push(chain.clone());
        }

        if let Some(name) = &config.query_name {
            args.push("--query".to_string());
            args.push(name.clone());
        }

        Self {
            program: program.into(),
            args,
            current_dir: tool_home.into(),
            env: Vec::new(),
        }
    }

    /// Add an environment variable for the child process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The full command line as recorded on the job record.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}
