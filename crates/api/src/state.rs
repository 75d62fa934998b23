use std::sync::Arc;

use conseq_events::Broker;

use crate::engine::JobQueue;

/// Shared application state available to Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already
/// `Clone`). The request-handling layer submits and cancels jobs through
/// `queue` and never talks to the engine internals directly.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: conseq_db::DbPool,
    /// Session-group broker shared with every gateway connection.
    pub broker: Arc<Broker>,
    /// Handle for submitting and cancelling job executions.
    pub queue: Arc<JobQueue>,
}
