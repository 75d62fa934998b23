use crate::types::DbId;

/// Errors raised while spawning or supervising the external analysis
/// process.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The analysis executable could not be started (missing binary,
    /// permission denied). Fatal for the job.
    #[error("Failed to launch analysis process: {0}")]
    Launch(#[source] std::io::Error),

    /// Waiting on the child process failed.
    #[error("Failed to wait for analysis process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Errors raised by the job record store or the file store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
