//! Bounded job dispatch queue.
//!
//! Accepts run requests without blocking the caller and hands them to
//! execution contexts in FIFO order, bounding concurrency with a
//! semaphore. One job's failure is contained in its spawned task and
//! never affects the loop or other running jobs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use conseq_core::types::DbId;

use super::runner::{self, RunnerContext};

/// A request to execute one job, tagged with the session whose viewers
/// should receive the progress events.
#[derive(Debug)]
struct RunRequest {
    job_id: DbId,
    session_id: String,
}

/// Handle for submitting and cancelling job executions.
pub struct JobQueue {
    tx: mpsc::UnboundedSender<RunRequest>,
    running: Arc<Mutex<HashMap<DbId, CancellationToken>>>,
}

impl JobQueue {
    /// Spawn the dispatch loop and return the queue handle.
    ///
    /// `capacity` bounds the number of concurrently executing jobs;
    /// requests beyond it wait in FIFO order. The loop runs until
    /// `shutdown` is cancelled.
    pub fn start(ctx: RunnerContext, capacity: usize, shutdown: CancellationToken) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let running = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(dispatch_loop(
            Arc::new(ctx),
            rx,
            capacity,
            shutdown,
            Arc::clone(&running),
        ));

        Arc::new(Self { tx, running })
    }

    /// Schedule a job execution without blocking the caller.
    pub fn enqueue(&self, job_id: DbId, session_id: impl Into<String>) {
        let request = RunRequest {
            job_id,
            session_id: session_id.into(),
        };
        if self.tx.send(request).is_err() {
            tracing::warn!(job_id, "Job queue is shut down; run request dropped");
        }
    }

    /// Request best-effort termination of a running job.
    ///
    /// Returns whether a running execution context was signalled. The
    /// runner still drives the job to a terminal state and emits the
    /// terminal event.
    pub async fn cancel(&self, job_id: DbId) -> bool {
        match self.running.lock().await.get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of currently executing jobs.
    pub async fn running_count(&self) -> usize {
        self.running.lock().await.len()
    }
}

/// FIFO dispatch: take the next request, wait for a free execution
/// slot, then spawn the runner with the slot's permit.
async fn dispatch_loop(
    ctx: Arc<RunnerContext>,
    mut rx: mpsc::UnboundedReceiver<RunRequest>,
    capacity: usize,
    shutdown: CancellationToken,
    running: Arc<Mutex<HashMap<DbId, CancellationToken>>>,
) {
    let slots = Arc::new(Semaphore::new(capacity));
    tracing::info!(capacity, "Job queue started");

    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Job queue shutting down");
                break;
            }
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Job queue shutting down");
                break;
            }
            permit = Arc::clone(&slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let token = CancellationToken::new();
        running
            .lock()
            .await
            .insert(request.job_id, token.clone());

        let ctx = Arc::clone(&ctx);
        let running = Arc::clone(&running);
        tokio::spawn(async move {
            let RunRequest { job_id, session_id } = request;
            runner::run_job(&ctx, job_id, &session_id, token).await;
            running.lock().await.remove(&job_id);
            drop(permit);
        });
    }
}
